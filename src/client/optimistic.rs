//! Optimistic adds and deletes over a server-backed list.
//!
//! The working list is always recomputed by [`merge`]: unresolved
//! placeholders first, then the authoritative entities that no placeholder
//! shadows. Each action ends in exactly one terminal transition (confirm or
//! rollback) and only ever touches its own placeholder or snapshot.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{api::ClientError, lock, notify::Notifier, store::EntityStore, Identified};

/// Upper bound on a resource upload before the placeholder is rolled back.
pub const RESOURCE_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub const TEMP_ID_PREFIX: &str = "tmp-";

pub fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Request(#[from] ClientError),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0} is not in the list")]
    NotFound(String),
    #[error("{0} already has a pending change")]
    Busy(String),
}

/// A client-side stand-in for an entity the server has not confirmed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Shadow<T> {
    pub value: T,
}

impl<T: Identified> Shadow<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn id(&self) -> &str {
        self.value.id()
    }
}

/// One row of the working list.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub value: T,
    pub optimistic: bool,
}

impl<T> Entry<T> {
    fn confirmed(value: T) -> Self {
        Self {
            value,
            optimistic: false,
        }
    }

    fn pending(value: T) -> Self {
        Self {
            value,
            optimistic: true,
        }
    }
}

/// Placeholders (newest first) followed by the authoritative entities whose
/// id no placeholder shares. A placeholder is also dropped once an
/// authoritative entity carries its id as [`Identified::client_token`].
pub fn merge<T: Identified + Clone>(optimistic: &[Shadow<T>], authoritative: &[T]) -> Vec<Entry<T>> {
    let claimed: Vec<&str> = authoritative
        .iter()
        .filter_map(|entity| entity.client_token())
        .collect();

    let mut merged: Vec<Entry<T>> = optimistic
        .iter()
        .filter(|shadow| !claimed.contains(&shadow.id()))
        .map(|shadow| Entry::pending(shadow.value.clone()))
        .collect();

    merged.extend(
        authoritative
            .iter()
            .filter(|entity| !optimistic.iter().any(|shadow| shadow.id() == entity.id()))
            .cloned()
            .map(Entry::confirmed),
    );
    merged
}

/// Synchronous state of one optimistic list.
#[derive(Debug, Clone)]
pub struct OptimisticList<T> {
    authoritative: EntityStore<T>,
    pending: Vec<Shadow<T>>,
    // Entities hidden by an in-flight delete, with their position at the time.
    hidden: HashMap<String, (usize, T)>,
}

impl<T> Default for OptimisticList<T> {
    fn default() -> Self {
        Self {
            authoritative: EntityStore::default(),
            pending: Vec::new(),
            hidden: HashMap::new(),
        }
    }
}

impl<T: Identified + Clone> OptimisticList<T> {
    pub fn new(items: Vec<T>) -> Self {
        let mut list = Self::default();
        list.authoritative.replace_all(items);
        list
    }

    pub fn items(&self) -> Vec<Entry<T>> {
        let visible: Vec<T> = self
            .authoritative
            .items()
            .iter()
            .filter(|entity| !self.hidden.contains_key(entity.id()))
            .cloned()
            .collect();
        merge(&self.pending, &visible)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn authoritative(&self) -> &[T] {
        self.authoritative.items()
    }

    /// Shows `placeholder` at the head. Its id is the action's temp id.
    pub fn begin_add(&mut self, placeholder: T) -> String {
        let id = placeholder.id().to_string();
        self.pending.insert(0, Shadow::new(placeholder));
        id
    }

    pub fn confirm_add(&mut self, temp_id: &str, entity: T) {
        self.pending.retain(|shadow| shadow.id() != temp_id);
        self.authoritative.upsert(entity);
    }

    pub fn rollback_add(&mut self, temp_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|shadow| shadow.id() != temp_id);
        self.pending.len() != before
    }

    /// Hides `id` and remembers it for rollback.
    pub fn begin_delete(&mut self, id: &str) -> Result<(), MutationError> {
        if self.hidden.contains_key(id) {
            return Err(MutationError::Busy(id.to_string()));
        }
        let index = self
            .authoritative
            .position(id)
            .ok_or_else(|| MutationError::NotFound(id.to_string()))?;
        let snapshot = self.authoritative.items()[index].clone();
        self.hidden.insert(id.to_string(), (index, snapshot));
        Ok(())
    }

    pub fn confirm_delete(&mut self, id: &str) {
        self.hidden.remove(id);
        self.authoritative.remove(id);
    }

    /// Un-hides `id`; puts the snapshot back if a refetch dropped it meanwhile.
    pub fn rollback_delete(&mut self, id: &str) {
        if let Some((index, snapshot)) = self.hidden.remove(id) {
            if !self.authoritative.contains(id) {
                self.authoritative.restore(index, snapshot);
            }
        }
    }

    pub fn replace_authoritative(&mut self, items: Vec<T>) {
        self.authoritative.replace_all(items);
    }

    pub fn upsert(&mut self, entity: T) {
        self.authoritative.upsert(entity);
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.authoritative.remove(id)
    }
}

/// Shared list plus the async drivers that run a request against it.
#[derive(Debug, Clone)]
pub struct OptimisticCollection<T> {
    list: Arc<Mutex<OptimisticList<T>>>,
    notifier: Notifier,
}

impl<T: Identified + Clone + Send + 'static> OptimisticCollection<T> {
    pub fn new(items: Vec<T>, notifier: Notifier) -> Self {
        Self {
            list: Arc::new(Mutex::new(OptimisticList::new(items))),
            notifier,
        }
    }

    pub fn items(&self) -> Vec<Entry<T>> {
        lock(&self.list).items()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.list).pending_count()
    }

    pub fn replace_authoritative(&self, items: Vec<T>) {
        lock(&self.list).replace_authoritative(items);
    }

    pub fn upsert(&self, entity: T) {
        lock(&self.list).upsert(entity);
    }

    /// Runs an optimistic add. `placeholder` and `request` both receive the
    /// action's temp id. Failure or timeout rolls the placeholder back and
    /// raises an error notification.
    pub async fn add<P, F, Fut>(
        &self,
        placeholder: P,
        request: F,
        timeout: Option<Duration>,
    ) -> Result<T, MutationError>
    where
        P: FnOnce(&str) -> T,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let temp = temp_id();
        lock(&self.list).begin_add(placeholder(&temp));
        debug!(temp_id = %temp, "optimistic add started");

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, request(temp.clone())).await {
                Ok(result) => result.map_err(MutationError::from),
                Err(_) => Err(MutationError::Timeout(limit)),
            },
            None => request(temp.clone()).await.map_err(MutationError::from),
        };

        match outcome {
            Ok(entity) => {
                lock(&self.list).confirm_add(&temp, entity.clone());
                Ok(entity)
            }
            Err(err) => {
                lock(&self.list).rollback_add(&temp);
                warn!(temp_id = %temp, error = %err, "optimistic add rolled back");
                self.notifier.error(err.to_string());
                Err(err)
            }
        }
    }

    /// Runs an optimistic delete of `id`.
    pub async fn delete<F, Fut>(&self, id: &str, request: F) -> Result<(), MutationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        if let Err(err) = lock(&self.list).begin_delete(id) {
            self.notifier.error(err.to_string());
            return Err(err);
        }

        match request().await {
            Ok(()) => {
                lock(&self.list).confirm_delete(id);
                Ok(())
            }
            Err(err) => {
                lock(&self.list).rollback_delete(id);
                warn!(id = %id, error = %err, "optimistic delete rolled back");
                let err = MutationError::from(err);
                self.notifier.error(err.to_string());
                Err(err)
            }
        }
    }
}
