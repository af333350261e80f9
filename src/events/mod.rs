/*!
 * # Events Module
 *
 * Fan-out of work order mutations to every open event stream.
 *
 * The [`SubscriberRegistry`] is created once at startup and handed to the
 * work order service as an `Arc<dyn Broadcaster>`. Each connected client
 * owns a [`Subscription`]: a bounded channel that is registered on creation
 * and deregistered when the handle is dropped (which is what axum does with
 * the response stream once the client goes away).
 *
 * Delivery is best effort. Every broadcast makes exactly one non-blocking
 * write attempt per subscriber in a snapshot of the set; a subscriber whose
 * write fails (buffer full or receiver gone) is removed afterwards. There is
 * no replay: frames carry a sequence number so clients can notice a gap, and
 * they recover by refetching.
 */

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::metrics::BROADCAST_METRICS;

/// Frames buffered per subscriber when no capacity is configured.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

/// Named frame types on the event stream.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    WorkOrderCreated,
    WorkOrderUpdated,
    WorkOrderDeleted,
}

impl EventKind {
    /// SSE `event:` name.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// A mutation notification before it is stamped and serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastEvent {
    pub kind: EventKind,
    pub payload: Value,
}

impl BroadcastEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    pub fn work_order_created(work_order: Value) -> Self {
        Self::new(EventKind::WorkOrderCreated, work_order)
    }

    pub fn work_order_updated(work_order: Value) -> Self {
        Self::new(EventKind::WorkOrderUpdated, work_order)
    }

    /// Deletions only carry the id.
    pub fn work_order_deleted(id: &str) -> Self {
        Self::new(EventKind::WorkOrderDeleted, json!({ "id": id }))
    }
}

/// What actually goes on the wire. `data` is serialized once per broadcast
/// and shared by every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub seq: u64,
    pub kind: EventKind,
    pub data: Arc<str>,
}

impl EventFrame {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber buffer is full")]
    Full,
    #[error("subscriber is disconnected")]
    Closed,
}

/// One open channel. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn try_deliver(&self, frame: &EventFrame) -> Result<(), DeliveryError>;
}

struct ChannelSink {
    tx: mpsc::Sender<EventFrame>,
}

impl EventSink for ChannelSink {
    fn try_deliver(&self, frame: &EventFrame) -> Result<(), DeliveryError> {
        self.tx.try_send(frame.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Outcome of a single broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub dropped: usize,
}

/// Seam between the services that mutate work orders and the fan-out.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, event: BroadcastEvent) -> BroadcastReport;
}

/// Process-wide set of open event stream channels.
pub struct SubscriberRegistry {
    subscribers: Mutex<BTreeMap<SubscriberId, Arc<dyn EventSink>>>,
    // Serializes stamping and delivery so every channel sees increasing seq.
    publish: Mutex<()>,
    next_id: AtomicU64,
    sequence: AtomicU64,
    buffer_capacity: usize,
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.subscriber_count())
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .field("buffer_capacity", &self.buffer_capacity)
            .finish()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Nothing panics while holding these locks; recover rather than cascade.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SubscriberRegistry {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            publish: Mutex::new(()),
            next_id: AtomicU64::new(1),
            sequence: AtomicU64::new(0),
            buffer_capacity: buffer_capacity.max(1),
        }
    }

    /// Opens a new channel. Dropping the returned handle deregisters it.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        let id = self.register(Arc::new(ChannelSink { tx }));
        Subscription {
            id,
            receiver: rx,
            registry: Arc::downgrade(self),
        }
    }

    pub fn register(&self, sink: Arc<dyn EventSink>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.insert(id, sink);
            subscribers.len()
        };
        BROADCAST_METRICS.set_active_subscribers(count);
        debug!(subscriber = %id, active = count, "event stream subscriber registered");
        id
    }

    /// Returns false when the id was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = lock(&self.subscribers);
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };
        if removed {
            BROADCAST_METRICS.set_active_subscribers(count);
            debug!(subscriber = %id, active = count, "event stream subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Highest sequence number handed out so far.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Writes `event` to every channel registered at the moment of the call.
    ///
    /// Never fails: channels that reject the write are deregistered and
    /// counted in [`BroadcastReport::dropped`].
    pub fn broadcast_all(&self, event: BroadcastEvent) -> BroadcastReport {
        let data: Arc<str> = match serde_json::to_string(&event.payload) {
            Ok(data) => data.into(),
            Err(e) => {
                error!(kind = event.kind.name(), error = %e, "failed to serialize event payload");
                return BroadcastReport::default();
            }
        };

        let _publishing = lock(&self.publish);

        let frame = EventFrame {
            seq: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            kind: event.kind,
            data,
        };

        let snapshot: Vec<(SubscriberId, Arc<dyn EventSink>)> = lock(&self.subscribers)
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        let mut report = BroadcastReport {
            attempted: snapshot.len(),
            ..Default::default()
        };
        let mut failed = Vec::new();

        for (id, sink) in &snapshot {
            match sink.try_deliver(&frame) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(subscriber = %id, seq = frame.seq, error = %e, "dropping event stream subscriber");
                    failed.push(*id);
                }
            }
        }

        for id in &failed {
            if self.unsubscribe(*id) {
                report.dropped += 1;
            }
        }

        BROADCAST_METRICS.record_broadcast(report.delivered, report.dropped);
        debug!(
            kind = frame.name(),
            seq = frame.seq,
            attempted = report.attempted,
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast work order event"
        );

        report
    }
}

impl Broadcaster for SubscriberRegistry {
    fn broadcast(&self, event: BroadcastEvent) -> BroadcastReport {
        self.broadcast_all(event)
    }
}

/// Receiving half of one registered channel.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<EventFrame>,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Resolves to `None` once the registry has dropped this channel.
    pub async fn recv(&mut self) -> Option<EventFrame> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<EventFrame>>,
    }

    impl EventSink for RecordingSink {
        fn try_deliver(&self, frame: &EventFrame) -> Result<(), DeliveryError> {
            self.frames.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct BrokenSink {
        attempts: AtomicUsize,
    }

    impl EventSink for BrokenSink {
        fn try_deliver(&self, _frame: &EventFrame) -> Result<(), DeliveryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::Closed)
        }
    }

    fn created(id: &str) -> BroadcastEvent {
        BroadcastEvent::work_order_created(json!({ "id": id, "title": "Fix valve" }))
    }

    #[test]
    fn broadcast_with_no_subscribers_is_a_no_op() {
        let registry = SubscriberRegistry::default();
        let report = registry.broadcast_all(BroadcastEvent::work_order_deleted("wo1"));
        assert_eq!(report, BroadcastReport::default());
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[test]
    fn a_failing_channel_does_not_stop_delivery_to_the_rest() {
        let registry = SubscriberRegistry::default();
        let first = Arc::new(RecordingSink::default());
        let broken = Arc::new(BrokenSink::default());
        let last = Arc::new(RecordingSink::default());
        registry.register(first.clone());
        registry.register(broken.clone());
        registry.register(last.clone());

        let report = registry.broadcast_all(created("wo42"));

        assert_eq!(
            report,
            BroadcastReport {
                attempted: 3,
                delivered: 2,
                dropped: 1
            }
        );
        assert_eq!(broken.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(first.frames.lock().unwrap().len(), 1);
        let frames = last.frames.lock().unwrap();
        assert_eq!(frames[0].name(), "work-order-created");
        assert!(frames[0].data.contains("\"wo42\""));
    }

    #[test]
    fn failed_channel_is_never_written_again() {
        let registry = SubscriberRegistry::default();
        let healthy = Arc::new(RecordingSink::default());
        let broken = Arc::new(BrokenSink::default());
        registry.register(healthy.clone());
        registry.register(broken.clone());

        registry.broadcast_all(created("wo1"));
        assert_eq!(registry.subscriber_count(), 1);

        for n in 2..5 {
            let report = registry.broadcast_all(created(&format!("wo{n}")));
            assert_eq!(report.attempted, 1);
            assert_eq!(report.dropped, 0);
        }
        assert_eq!(broken.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.frames.lock().unwrap().len(), 4);
    }

    /// Removes another subscriber from inside its own delivery.
    struct Evictor {
        registry: Arc<SubscriberRegistry>,
        victim: Mutex<Option<SubscriberId>>,
        delivered: AtomicUsize,
    }

    impl EventSink for Evictor {
        fn try_deliver(&self, _frame: &EventFrame) -> Result<(), DeliveryError> {
            if let Some(victim) = self.victim.lock().unwrap().take() {
                self.registry.unsubscribe(victim);
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn membership_changes_during_delivery_do_not_skip_snapshot_entries() {
        let registry = Arc::new(SubscriberRegistry::default());
        let evictor = Arc::new(Evictor {
            registry: registry.clone(),
            victim: Mutex::new(None),
            delivered: AtomicUsize::new(0),
        });
        let victim = Arc::new(RecordingSink::default());
        let bystander = Arc::new(RecordingSink::default());

        registry.register(evictor.clone());
        let victim_id = registry.register(victim.clone());
        registry.register(bystander.clone());
        *evictor.victim.lock().unwrap() = Some(victim_id);

        let report = registry.broadcast_all(created("wo7"));
        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 3);
        assert_eq!(victim.frames.lock().unwrap().len(), 1);
        assert_eq!(bystander.frames.lock().unwrap().len(), 1);
        assert_eq!(registry.subscriber_count(), 2);

        let report = registry.broadcast_all(created("wo8"));
        assert_eq!(report.attempted, 2);
        assert_eq!(evictor.delivered.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn subscription_receives_frames_in_broadcast_order() {
        let registry = Arc::new(SubscriberRegistry::new(8));
        let mut subscription = registry.subscribe();

        registry.broadcast_all(created("wo1"));
        registry.broadcast_all(BroadcastEvent::work_order_updated(json!({ "id": "wo1" })));
        registry.broadcast_all(BroadcastEvent::work_order_deleted("wo1"));

        let kinds: Vec<(u64, EventKind)> = [
            subscription.recv().await.unwrap(),
            subscription.recv().await.unwrap(),
            subscription.recv().await.unwrap(),
        ]
        .iter()
        .map(|f| (f.seq, f.kind))
        .collect();
        assert_eq!(
            kinds,
            vec![
                (1, EventKind::WorkOrderCreated),
                (2, EventKind::WorkOrderUpdated),
                (3, EventKind::WorkOrderDeleted)
            ]
        );
        assert_eq!(registry.last_sequence(), 3);
    }

    #[tokio::test]
    async fn dropping_a_subscription_deregisters_it() {
        let registry = Arc::new(SubscriberRegistry::default());
        let a = registry.subscribe();
        let _b = registry.subscribe();
        assert_eq!(registry.subscriber_count(), 2);
        drop(a);
        assert_eq!(registry.subscriber_count(), 1);
        assert_eq!(registry.broadcast_all(created("wo1")).attempted, 1);
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_when_its_buffer_fills() {
        let registry = Arc::new(SubscriberRegistry::new(1));
        let mut slow = registry.subscribe();

        assert_eq!(registry.broadcast_all(created("wo1")).delivered, 1);
        let report = registry.broadcast_all(created("wo2"));
        assert_eq!(report.dropped, 1);
        assert_eq!(registry.subscriber_count(), 0);

        // buffered frame is still readable, then the stream ends
        assert_eq!(slow.recv().await.map(|f| f.seq), Some(1));
        assert!(slow.recv().await.is_none());
    }

    #[test]
    fn event_kind_names_match_wire_format() {
        for kind in [
            EventKind::WorkOrderCreated,
            EventKind::WorkOrderUpdated,
            EventKind::WorkOrderDeleted,
        ] {
            assert!(kind.name().starts_with("work-order-"));
            assert_eq!(kind.name(), kind.to_string());
            assert_eq!(kind.name().parse::<EventKind>().unwrap(), kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.name()));
        }
        assert_eq!(
            BroadcastEvent::work_order_deleted("wo1").payload,
            json!({ "id": "wo1" })
        );
    }
}
