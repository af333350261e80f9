/*!
 * # Client Module
 *
 * The consuming side of the work order API: a typed HTTP client, an
 * incremental event stream decoder, a keyed entity store fed by the event
 * consumer, and optimistic note/resource lists for a detail view.
 */

pub mod api;
pub mod consumer;
pub mod notify;
pub mod optimistic;
pub mod session;
pub mod sse;
pub mod store;

pub use api::{ClientError, FsmClient, UploadFile};
pub use consumer::{ConsumerStats, EventConsumer, WorkOrderEvent};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use optimistic::{merge, Entry, MutationError, OptimisticCollection, OptimisticList, Shadow};
pub use session::WorkOrderDetailView;
pub use sse::{FrameDecoder, SseFrame};
pub use store::{EntityStore, SharedStore};

use std::sync::{Mutex, MutexGuard};

use crate::dto::{NoteResponse, ResourceResponse, WorkOrderResponse};

/// Anything kept in a store or optimistic list.
pub trait Identified {
    fn id(&self) -> &str;

    /// Temp id of the optimistic action that created this entity, when the
    /// server echoes it back.
    fn client_token(&self) -> Option<&str> {
        None
    }
}

impl Identified for WorkOrderResponse {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for NoteResponse {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for ResourceResponse {
    fn id(&self) -> &str {
        &self.id
    }

    fn client_token(&self) -> Option<&str> {
        self.client_token.as_deref()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
