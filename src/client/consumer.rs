use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{lock, notify::Notifier, sse::FrameDecoder, sse::SseFrame, store::SharedStore};
use crate::dto::WorkOrderResponse;
use crate::events::EventKind;

/// A decoded work order event.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOrderEvent {
    Created(WorkOrderResponse),
    Updated(WorkOrderResponse),
    Deleted { id: String },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
    #[error("bad payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct DeletedPayload {
    id: String,
}

impl WorkOrderEvent {
    pub fn from_frame(frame: &SseFrame) -> Result<Self, FrameError> {
        let kind: EventKind = frame
            .event
            .parse()
            .map_err(|_| FrameError::UnknownEvent(frame.event.clone()))?;
        Ok(match kind {
            EventKind::WorkOrderCreated => Self::Created(serde_json::from_str(&frame.data)?),
            EventKind::WorkOrderUpdated => Self::Updated(serde_json::from_str(&frame.data)?),
            EventKind::WorkOrderDeleted => {
                let payload: DeletedPayload = serde_json::from_str(&frame.data)?;
                Self::Deleted { id: payload.id }
            }
        })
    }

    pub fn work_order_id(&self) -> &str {
        match self {
            Self::Created(order) | Self::Updated(order) => &order.id,
            Self::Deleted { id } => id,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Created(order) => format!("Work order \"{}\" created", order.title),
            Self::Updated(order) => format!("Work order \"{}\" updated", order.title),
            Self::Deleted { id } => format!("Work order {} deleted", id),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub applied: u64,
    pub dropped: u64,
    pub gaps: u64,
    pub last_sequence: Option<u64>,
}

type Listener = Arc<dyn Fn(&WorkOrderEvent) + Send + Sync>;

/// Applies pushed work order events to a shared store.
///
/// Malformed or unknown frames are logged and dropped. Missed frames are
/// never requested again; a jump in the sequence is only logged and
/// counted, and the owner's periodic refetch heals the store.
pub struct EventConsumer {
    store: SharedStore<WorkOrderResponse>,
    notifier: Notifier,
    listeners: Vec<Listener>,
    stats: ConsumerStats,
}

impl EventConsumer {
    pub fn new(store: SharedStore<WorkOrderResponse>, notifier: Notifier) -> Self {
        Self {
            store,
            notifier,
            listeners: Vec::new(),
            stats: ConsumerStats::default(),
        }
    }

    /// Called after each applied event, outside the store lock.
    pub fn on_event(mut self, listener: impl Fn(&WorkOrderEvent) + Send + Sync + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
    }

    pub fn apply(&mut self, frame: &SseFrame) -> Option<WorkOrderEvent> {
        self.track_sequence(frame);

        let event = match WorkOrderEvent::from_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(event = %frame.event, error = %e, "dropping event frame");
                self.stats.dropped += 1;
                return None;
            }
        };

        {
            let mut store = lock(&self.store);
            match &event {
                WorkOrderEvent::Created(order) | WorkOrderEvent::Updated(order) => {
                    store.upsert(order.clone())
                }
                WorkOrderEvent::Deleted { id } => {
                    store.remove(id);
                }
            }
        }
        self.notifier.info(event.describe());
        for listener in &self.listeners {
            listener(&event);
        }
        self.stats.applied += 1;
        debug!(work_order_id = %event.work_order_id(), "applied event");
        Some(event)
    }

    fn track_sequence(&mut self, frame: &SseFrame) {
        let Some(seq) = frame.sequence() else {
            return;
        };
        if let Some(last) = self.stats.last_sequence {
            if seq > last + 1 {
                warn!(expected = last + 1, received = seq, "event sequence gap");
                self.stats.gaps += 1;
            }
        }
        self.stats.last_sequence = Some(seq);
    }

    /// Reads `stream` until it ends, fails, or `shutdown` flips to true.
    pub async fn run<S, E>(mut self, stream: S, mut shutdown: watch::Receiver<bool>) -> ConsumerStats
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let mut decoder = FrameDecoder::new();
        futures::pin_mut!(stream);

        if *shutdown.borrow() {
            return self.stats;
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("event consumer shut down");
                        break;
                    }
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for frame in decoder.push(&bytes) {
                            self.apply(&frame);
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "event stream failed");
                        break;
                    }
                    None => {
                        info!("event stream closed by server");
                        break;
                    }
                }
            }
        }
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::EntityStore;
    use serde_json::json;

    fn order_json(id: &str, title: &str) -> String {
        json!({
            "id": id, "title": title, "description": null, "status": "scheduled",
            "priority": "normal", "customerId": null, "providerId": null, "address": null,
            "scheduledStart": null, "scheduledEnd": null, "technicianIds": [],
            "price": "0", "createdBy": null,
            "createdAt": "2024-05-01T08:00:00Z", "updatedAt": "2024-05-01T08:00:00Z"
        })
        .to_string()
    }

    fn frame(event: &str, seq: u64, data: String) -> SseFrame {
        SseFrame {
            event: event.into(),
            data,
            id: Some(seq.to_string()),
        }
    }

    fn ids(store: &SharedStore<WorkOrderResponse>) -> Vec<String> {
        lock(store).items().iter().map(|o| o.id.clone()).collect()
    }

    #[test]
    fn created_updated_deleted_drive_the_store() {
        let store = EntityStore::shared();
        let mut consumer = EventConsumer::new(store.clone(), Notifier::default());

        consumer.apply(&frame("work-order-created", 1, order_json("wo42", "Fix valve")));
        consumer.apply(&frame("work-order-updated", 2, order_json("wo42", "Fix valve today")));
        assert_eq!(ids(&store), vec!["wo42"]);
        assert_eq!(lock(&store).get("wo42").unwrap().title, "Fix valve today");

        consumer.apply(&frame("work-order-deleted", 3, json!({"id": "wo42"}).to_string()));
        assert!(lock(&store).is_empty());
        assert_eq!(consumer.stats().applied, 3);
    }

    #[test]
    fn bad_frames_are_dropped_and_gaps_counted() {
        let store = EntityStore::shared();
        let mut consumer = EventConsumer::new(store.clone(), Notifier::default());

        assert!(consumer.apply(&frame("work-order-created", 1, "{not json".into())).is_none());
        assert!(consumer.apply(&frame("customer-created", 2, "{}".into())).is_none());
        consumer.apply(&frame("work-order-created", 5, order_json("wo1", "A")));

        let stats = consumer.stats();
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.gaps, 1);
        assert_eq!(stats.last_sequence, Some(5));
        assert_eq!(ids(&store), vec!["wo1"]);
    }

    #[test]
    fn push_and_refetch_in_either_order_leave_one_copy() {
        let store = EntityStore::shared();
        let mut consumer = EventConsumer::new(store.clone(), Notifier::default());
        let fetched: WorkOrderResponse =
            serde_json::from_str(&order_json("wo7", "Fetched")).unwrap();

        consumer.apply(&frame("work-order-created", 1, order_json("wo7", "Pushed")));
        lock(&store).replace_all(vec![fetched.clone()]);
        assert_eq!(ids(&store), vec!["wo7"]);

        lock(&store).replace_all(vec![fetched]);
        consumer.apply(&frame("work-order-updated", 2, order_json("wo7", "Pushed")));
        assert_eq!(ids(&store), vec!["wo7"]);
        assert_eq!(lock(&store).get("wo7").unwrap().title, "Pushed");
    }

    #[tokio::test]
    async fn run_decodes_stream_until_it_ends() {
        let store = EntityStore::shared();
        let (_tx, rx) = watch::channel(false);
        let body = format!(
            ": keep-alive\n\nevent: work-order-created\nid: 1\ndata: {}\n\n",
            order_json("wo42", "Fix valve")
        );
        let (head, tail) = body.as_bytes().split_at(30);
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ];

        let stats = EventConsumer::new(store.clone(), Notifier::default())
            .run(futures::stream::iter(chunks), rx)
            .await;

        assert_eq!(stats.applied, 1);
        assert_eq!(ids(&store), vec!["wo42"]);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let store = EntityStore::shared();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(
            EventConsumer::new(store, Notifier::default())
                .run(futures::stream::pending::<Result<Bytes, std::io::Error>>(), rx),
        );
        tx.send(true).unwrap();
        let stats = handle.await.unwrap();
        assert_eq!(stats.applied, 0);
    }
}
