use crate::{
    db::DbPool,
    dto::{CreateProviderRequest, UpdateProviderRequest},
    errors::ServiceError,
    models::{provider, work_order},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::page_window;

/// Subcontracting companies work orders can be handed to.
#[derive(Clone)]
pub struct ProviderService {
    db_pool: Arc<DbPool>,
}

impl ProviderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_providers(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<provider::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let (page, per_page) = page_window(page, per_page);

        let total = provider::Entity::find().count(db).await?;
        let providers = provider::Entity::find()
            .order_by_asc(provider::Column::Name)
            .offset((page - 1) * per_page)
            .limit(per_page)
            .all(db)
            .await?;

        Ok((providers, total))
    }

    #[instrument(skip(self))]
    pub async fn get_provider(&self, id: &str) -> Result<provider::Model, ServiceError> {
        provider::Entity::find_by_id(id.to_string())
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Provider", id))
    }

    #[instrument(skip(self, request))]
    pub async fn create_provider(
        &self,
        request: CreateProviderRequest,
    ) -> Result<provider::Model, ServiceError> {
        let now = Utc::now();
        let model = provider::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(request.name.trim().to_string()),
            contact_name: Set(request.contact_name),
            email: Set(request.email),
            phone: Set(request.phone),
            specialty: Set(request.specialty),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(provider_id = %model.id, "provider created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_provider(
        &self,
        id: &str,
        request: UpdateProviderRequest,
    ) -> Result<provider::Model, ServiceError> {
        let mut active: provider::ActiveModel = self.get_provider(id).await?.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(contact_name) = request.contact_name {
            active.contact_name = Set(Some(contact_name));
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(specialty) = request.specialty {
            active.specialty = Set(Some(specialty));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_provider(&self, id: &str) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let assigned = work_order::Entity::find()
            .filter(work_order::Column::ProviderId.eq(id))
            .count(db)
            .await?;
        if assigned > 0 {
            return Err(ServiceError::Conflict(format!(
                "provider {} is still assigned to {} work order(s)",
                id, assigned
            )));
        }

        let result = provider::Entity::delete_by_id(id.to_string()).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Provider", id));
        }
        info!(provider_id = %id, "provider deleted");
        Ok(())
    }
}
