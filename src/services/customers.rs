use crate::{
    db::DbPool,
    dto::{CreateCustomerRequest, UpdateCustomerRequest},
    errors::ServiceError,
    models::{customer, work_order},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{column_contains, page_window};

/// Service for managing customers
#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Lists customers, optionally narrowed by a name/email substring.
    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        search: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<customer::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let (page, per_page) = page_window(page, per_page);

        let mut query = customer::Entity::find();
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(column_contains(customer::Column::Name, term))
                    .add(column_contains(customer::Column::Email, term)),
            );
        }

        let total = query.clone().count(db).await?;
        let customers = query
            .order_by_asc(customer::Column::Name)
            .offset((page - 1) * per_page)
            .limit(per_page)
            .all(db)
            .await?;

        Ok((customers, total))
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, id: &str) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id.to_string())
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", id))
    }

    #[instrument(skip(self, request))]
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        let now = Utc::now();
        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(request.name.trim().to_string()),
            email: Set(request.email),
            phone: Set(request.phone),
            address: Set(request.address),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(customer_id = %model.id, "customer created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_customer(
        &self,
        id: &str,
        request: UpdateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        let mut active: customer::ActiveModel = self.get_customer(id).await?.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db_pool).await?)
    }

    /// Customers that still own work orders cannot be removed.
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, id: &str) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let open_orders = work_order::Entity::find()
            .filter(work_order::Column::CustomerId.eq(id))
            .count(db)
            .await?;
        if open_orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "customer {} still has {} work order(s)",
                id, open_orders
            )));
        }

        let result = customer::Entity::delete_by_id(id.to_string()).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Customer", id));
        }
        info!(customer_id = %id, "customer deleted");
        Ok(())
    }
}
