use crate::{
    auth::AuthUser,
    dto::{LocationResponse, LocationUpdate},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Latest GPS fix per user, held in memory only. Fixes older than the TTL
/// are treated as absent and pruned lazily.
#[derive(Clone)]
pub struct LocationService {
    fixes: Arc<DashMap<String, LocationResponse>>,
    ttl: ChronoDuration,
}

impl LocationService {
    pub fn new(ttl: Duration) -> Self {
        Self {
            fixes: Arc::new(DashMap::new()),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(1)),
        }
    }

    fn is_fresh(&self, fix: &LocationResponse, now: DateTime<Utc>) -> bool {
        now - fix.recorded_at <= self.ttl
    }

    #[instrument(skip(self, user, update), fields(user_id = %user.user_id))]
    pub fn report(&self, user: &AuthUser, update: LocationUpdate) -> LocationResponse {
        self.record_at(user, update, Utc::now())
    }

    pub(crate) fn record_at(
        &self,
        user: &AuthUser,
        update: LocationUpdate,
        recorded_at: DateTime<Utc>,
    ) -> LocationResponse {
        let fix = LocationResponse {
            user_id: user.user_id.clone(),
            user_name: user.name.clone(),
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy: update.accuracy,
            heading: update.heading,
            recorded_at,
        };
        self.fixes.insert(user.user_id.clone(), fix.clone());
        debug!(lat = fix.latitude, lng = fix.longitude, "location recorded");
        fix
    }

    /// Fresh fixes, ordered by user name.
    pub fn list(&self) -> Vec<LocationResponse> {
        let now = Utc::now();
        self.fixes.retain(|_, fix| self.is_fresh(fix, now));
        let mut fixes: Vec<LocationResponse> =
            self.fixes.iter().map(|entry| entry.value().clone()).collect();
        fixes.sort_by(|a, b| a.user_name.cmp(&b.user_name).then(a.user_id.cmp(&b.user_id)));
        fixes
    }

    pub fn get(&self, user_id: &str) -> Option<LocationResponse> {
        let now = Utc::now();
        self.fixes
            .get(user_id)
            .map(|entry| entry.value().clone())
            .filter(|fix| self.is_fresh(fix, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn tech(id: &str, name: &str) -> AuthUser {
        AuthUser {
            user_id: id.into(),
            name: name.into(),
            email: format!("{}@example.com", id),
            role: UserRole::Technician,
            token_id: "jti".into(),
        }
    }

    fn fix(lat: f64, lng: f64) -> LocationUpdate {
        LocationUpdate {
            latitude: lat,
            longitude: lng,
            accuracy: Some(5.0),
            heading: None,
        }
    }

    #[test]
    fn latest_fix_wins_and_list_is_sorted() {
        let service = LocationService::new(Duration::from_secs(600));
        service.report(&tech("u2", "Zoe"), fix(1.0, 1.0));
        service.report(&tech("u1", "Abe"), fix(2.0, 2.0));
        service.report(&tech("u1", "Abe"), fix(3.0, 3.0));

        let all = service.list();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].user_name, "Abe");
        assert_eq!(all[0].latitude, 3.0);
        assert_eq!(service.get("u2").map(|f| f.longitude), Some(1.0));
    }

    #[test]
    fn stale_fixes_are_hidden() {
        let service = LocationService::new(Duration::from_secs(60));
        let old = Utc::now() - ChronoDuration::minutes(5);
        service.record_at(&tech("u1", "Abe"), fix(1.0, 1.0), old);
        service.report(&tech("u2", "Bea"), fix(2.0, 2.0));

        assert!(service.get("u1").is_none());
        let all = service.list();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].user_id, "u2");
    }
}
