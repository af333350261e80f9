use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::lock;

/// How long a notification stays visible unless dismissed earlier.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: Instant,
}

#[derive(Debug, Default)]
struct NotifierState {
    next_id: u64,
    items: Vec<Notification>,
}

/// Transient, dismissable messages shared by the views of one session.
#[derive(Debug, Clone)]
pub struct Notifier {
    state: Arc<Mutex<NotifierState>>,
    ttl: Duration,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_TTL)
    }
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(NotifierState::default())),
            ttl,
        }
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) -> u64 {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.items.push(Notification {
            id,
            level,
            message: message.into(),
            created_at: Instant::now(),
        });
        id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Info, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Error, message)
    }

    pub fn dismiss(&self, id: u64) -> bool {
        let mut state = lock(&self.state);
        let before = state.items.len();
        state.items.retain(|n| n.id != id);
        state.items.len() != before
    }

    /// Visible notifications, oldest first. Expired ones are dropped here.
    pub fn active(&self) -> Vec<Notification> {
        self.active_at(Instant::now())
    }

    pub(crate) fn active_at(&self, now: Instant) -> Vec<Notification> {
        let mut state = lock(&self.state);
        let ttl = self.ttl;
        state
            .items
            .retain(|n| now.saturating_duration_since(n.created_at) < ttl);
        state.items.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_expire_and_can_be_dismissed() {
        let notifier = Notifier::new(Duration::from_secs(5));
        let first = notifier.error("upload failed");
        let second = notifier.info("work order wo42 updated");

        assert_eq!(notifier.active().len(), 2);
        assert!(notifier.dismiss(first));
        assert!(!notifier.dismiss(first));

        let later = Instant::now() + Duration::from_secs(6);
        assert!(notifier.active_at(later).is_empty());
        assert!(!notifier.dismiss(second));
    }
}
