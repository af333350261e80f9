use crate::{
    auth::AuthUser,
    db::DbPool,
    dto::CreateNoteRequest,
    errors::ServiceError,
    metrics::BUSINESS_METRICS,
    models::{work_order, work_order_note},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Work order notes. Plain REST; nothing is pushed on change.
#[derive(Clone)]
pub struct NoteService {
    db_pool: Arc<DbPool>,
}

impl NoteService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn ensure_work_order(&self, work_order_id: &str) -> Result<(), ServiceError> {
        work_order::Entity::find_by_id(work_order_id.to_string())
            .one(&*self.db_pool)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Work order", work_order_id))
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_notes(
        &self,
        work_order_id: &str,
    ) -> Result<Vec<work_order_note::Model>, ServiceError> {
        self.ensure_work_order(work_order_id).await?;
        Ok(work_order_note::Entity::find()
            .filter(work_order_note::Column::WorkOrderId.eq(work_order_id))
            .order_by_desc(work_order_note::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self, request, author), fields(author = %author.user_id))]
    pub async fn add_note(
        &self,
        work_order_id: &str,
        request: CreateNoteRequest,
        author: &AuthUser,
    ) -> Result<work_order_note::Model, ServiceError> {
        self.ensure_work_order(work_order_id).await?;

        let note = work_order_note::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            work_order_id: Set(work_order_id.to_string()),
            author_id: Set(Some(author.user_id.clone())),
            author_name: Set(Some(author.name.clone())),
            body: Set(request.body.trim().to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db_pool)
        .await?;

        BUSINESS_METRICS.notes_added.inc();
        info!(note_id = %note.id, work_order_id = %work_order_id, "note added");
        Ok(note)
    }

    /// Authors may delete their own notes; dispatchers may delete any.
    #[instrument(skip(self, actor))]
    pub async fn delete_note(
        &self,
        work_order_id: &str,
        note_id: &str,
        actor: &AuthUser,
    ) -> Result<(), ServiceError> {
        let note = work_order_note::Entity::find_by_id(note_id.to_string())
            .filter(work_order_note::Column::WorkOrderId.eq(work_order_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Note", note_id))?;

        if !actor.can_dispatch() && note.author_id.as_deref() != Some(actor.user_id.as_str()) {
            return Err(ServiceError::Forbidden(
                "only the author or a dispatcher may delete this note".into(),
            ));
        }

        work_order_note::Entity::delete_by_id(note.id)
            .exec(&*self.db_pool)
            .await?;
        info!(note_id = %note_id, work_order_id = %work_order_id, "note deleted");
        Ok(())
    }
}
