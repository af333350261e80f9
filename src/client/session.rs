use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    api::{ClientError, FsmClient, UploadFile},
    consumer::{EventConsumer, WorkOrderEvent},
    lock,
    notify::{Notification, Notifier},
    optimistic::{Entry, MutationError, OptimisticCollection, RESOURCE_UPLOAD_TIMEOUT},
    store::{EntityStore, SharedStore},
};
use crate::dto::{resource::resource_url, NoteResponse, ResourceResponse, WorkOrderResponse};

/// Safety-net refetch while a detail view is open.
pub const DETAIL_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Everything a detail screen for one work order needs.
///
/// Opening it fetches the order, then runs two background tasks: the event
/// consumer (pushed changes to any work order) and a poll of this order
/// every [`DETAIL_POLL_INTERVAL`]. Both stop on [`close`](Self::close) or
/// when the view is dropped. Once the order is deleted its notes and
/// resources are cleared and polling ends.
pub struct WorkOrderDetailView {
    work_order_id: String,
    client: FsmClient,
    orders: SharedStore<WorkOrderResponse>,
    notes: OptimisticCollection<NoteResponse>,
    resources: OptimisticCollection<ResourceResponse>,
    notifier: Notifier,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Clone)]
struct Refresher {
    work_order_id: String,
    client: FsmClient,
    orders: SharedStore<WorkOrderResponse>,
    notes: OptimisticCollection<NoteResponse>,
    resources: OptimisticCollection<ResourceResponse>,
}

impl Refresher {
    fn apply(&self, order: WorkOrderResponse) {
        if let Some(notes) = order.notes.clone() {
            self.notes.replace_authoritative(notes);
        }
        if let Some(resources) = order.resources.clone() {
            self.resources.replace_authoritative(resources);
        }
        lock(&self.orders).upsert(order);
    }

    /// Drops the order and everything attached to it.
    fn forget(&self) {
        lock(&self.orders).remove(&self.work_order_id);
        self.notes.replace_authoritative(Vec::new());
        self.resources.replace_authoritative(Vec::new());
    }

    async fn refresh(&self) -> Result<(), ClientError> {
        match self.client.get_work_order(&self.work_order_id).await {
            Ok(order) => {
                self.apply(order);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                self.forget();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

impl WorkOrderDetailView {
    /// Must be called inside a tokio runtime.
    pub async fn open(client: FsmClient, work_order_id: &str) -> Result<Self, ClientError> {
        Self::open_with(client, work_order_id, EntityStore::shared(), Notifier::default()).await
    }

    /// Opens the view over a store and notifier shared with other views.
    pub async fn open_with(
        client: FsmClient,
        work_order_id: &str,
        orders: SharedStore<WorkOrderResponse>,
        notifier: Notifier,
    ) -> Result<Self, ClientError> {
        let initial = client.get_work_order(work_order_id).await?;

        let refresher = Refresher {
            work_order_id: work_order_id.to_string(),
            client: client.clone(),
            orders: orders.clone(),
            notes: OptimisticCollection::new(Vec::new(), notifier.clone()),
            resources: OptimisticCollection::new(Vec::new(), notifier.clone()),
        };
        refresher.apply(initial);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            Self::spawn_consumer(refresher.clone(), notifier.clone(), shutdown_rx.clone()),
            Self::spawn_poller(refresher.clone(), shutdown_rx),
        ];
        info!(work_order_id = %work_order_id, "detail view opened");

        Ok(Self {
            work_order_id: refresher.work_order_id,
            client,
            orders,
            notes: refresher.notes,
            resources: refresher.resources,
            notifier,
            shutdown,
            tasks,
        })
    }

    fn spawn_consumer(
        refresher: Refresher,
        notifier: Notifier,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let stream = match refresher.client.open_event_stream().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "could not open event stream; relying on polling");
                    return;
                }
            };
            let watched = refresher.clone();
            let consumer = EventConsumer::new(refresher.orders.clone(), notifier).on_event(
                move |event| match event {
                    WorkOrderEvent::Created(order) | WorkOrderEvent::Updated(order)
                        if order.id == watched.work_order_id =>
                    {
                        if let Some(notes) = order.notes.clone() {
                            watched.notes.replace_authoritative(notes);
                        }
                        if let Some(resources) = order.resources.clone() {
                            watched.resources.replace_authoritative(resources);
                        }
                    }
                    WorkOrderEvent::Deleted { id } if *id == watched.work_order_id => {
                        watched.forget();
                    }
                    _ => {}
                },
            );
            let stats = consumer.run(stream, shutdown).await;
            debug!(applied = stats.applied, gaps = stats.gaps, "event consumer finished");
        })
    }

    fn spawn_poller(refresher: Refresher, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DETAIL_POLL_INTERVAL);
            // The first tick completes immediately and the view was just fetched.
            ticker.tick().await;
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => match refresher.refresh().await {
                        Ok(()) => {}
                        Err(e) if e.is_not_found() => {
                            info!(work_order_id = %refresher.work_order_id, "work order gone; polling stopped");
                            break;
                        }
                        Err(e) => debug!(error = %e, "detail poll failed"),
                    },
                }
            }
        })
    }

    pub fn work_order_id(&self) -> &str {
        &self.work_order_id
    }

    /// Latest known state, `None` once the order is gone.
    pub fn work_order(&self) -> Option<WorkOrderResponse> {
        lock(&self.orders).get(&self.work_order_id).cloned()
    }

    pub fn notes(&self) -> Vec<Entry<NoteResponse>> {
        self.notes.items()
    }

    pub fn resources(&self) -> Vec<Entry<ResourceResponse>> {
        self.resources.items()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifier.active()
    }

    pub fn dismiss(&self, notification_id: u64) -> bool {
        self.notifier.dismiss(notification_id)
    }

    /// Refetches immediately instead of waiting for the next poll.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        Refresher {
            work_order_id: self.work_order_id.clone(),
            client: self.client.clone(),
            orders: self.orders.clone(),
            notes: self.notes.clone(),
            resources: self.resources.clone(),
        }
        .refresh()
        .await
    }

    pub async fn add_note(&self, body: &str) -> Result<NoteResponse, MutationError> {
        let work_order_id = self.work_order_id.as_str();
        let client = &self.client;
        self.notes
            .add(
                |temp| NoteResponse {
                    id: temp.to_string(),
                    work_order_id: work_order_id.to_string(),
                    author_id: None,
                    author_name: None,
                    body: body.to_string(),
                    created_at: Utc::now(),
                },
                |_temp| async move { client.add_note(work_order_id, body).await },
                None,
            )
            .await
    }

    pub async fn delete_note(&self, note_id: &str) -> Result<(), MutationError> {
        let client = &self.client;
        let work_order_id = self.work_order_id.as_str();
        self.notes
            .delete(note_id, || client.delete_note(work_order_id, note_id))
            .await
    }

    /// Uploads with the placeholder's temp id as the idempotency token, so
    /// a retry after a timeout cannot store the file twice.
    pub async fn add_resource(&self, file: UploadFile) -> Result<ResourceResponse, MutationError> {
        let work_order_id = self.work_order_id.as_str();
        let client = &self.client;
        let size_bytes = file.data.len() as i64;
        let file_name = file.file_name.clone();
        let content_type = file.content_type.clone();
        self.resources
            .add(
                move |temp| ResourceResponse {
                    id: temp.to_string(),
                    url: resource_url(work_order_id, temp),
                    work_order_id: work_order_id.to_string(),
                    file_name,
                    content_type,
                    size_bytes,
                    client_token: None,
                    uploaded_by: None,
                    created_at: Utc::now(),
                },
                |temp| async move {
                    client
                        .upload_resource(work_order_id, file, Some(&temp))
                        .await
                },
                Some(RESOURCE_UPLOAD_TIMEOUT),
            )
            .await
    }

    pub async fn delete_resource(&self, resource_id: &str) -> Result<(), MutationError> {
        let client = &self.client;
        let work_order_id = self.work_order_id.as_str();
        self.resources
            .delete(resource_id, || {
                client.delete_resource(work_order_id, resource_id)
            })
            .await
    }

    /// Stops the event consumer and the poller.
    pub fn close(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        debug!(work_order_id = %self.work_order_id, "detail view closed");
    }

    pub fn is_closed(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for WorkOrderDetailView {
    fn drop(&mut self) {
        self.close();
    }
}
