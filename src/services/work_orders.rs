use crate::{
    auth::AuthUser,
    db::DbPool,
    dto::{
        CreateWorkOrderRequest, NoteResponse, ResourceResponse, UpdateWorkOrderRequest,
        WorkOrderResponse,
    },
    errors::ServiceError,
    events::{BroadcastEvent, Broadcaster},
    metrics::BUSINESS_METRICS,
    models::{
        customer, invoice, provider, user, work_order, work_order_note, work_order_resource,
        work_order::pack_technician_ids, WorkOrderPriority, WorkOrderStatus,
    },
    services::invoices,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::IntoParams;
use uuid::Uuid;

use super::{column_contains, page_window, parse_enum};

/// Query filters for work order listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct WorkOrderFilter {
    pub status: Option<String>,
    pub customer_id: Option<String>,
    pub technician_id: Option<String>,
    /// Earliest scheduled start
    pub from: Option<DateTime<Utc>>,
    /// Latest scheduled start
    pub to: Option<DateTime<Utc>>,
}

/// Service for managing work orders. Every successful create, update and
/// delete is pushed to connected event streams after the transaction commits.
#[derive(Clone)]
pub struct WorkOrderService {
    db_pool: Arc<DbPool>,
    broadcaster: Arc<dyn Broadcaster>,
    invoice_due_days: i64,
    upload_dir: PathBuf,
}

fn check_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), ServiceError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ServiceError::ValidationError(
            "scheduledEnd must not be before scheduledStart".into(),
        )),
        _ => Ok(()),
    }
}

fn touches_more_than_status(request: &UpdateWorkOrderRequest) -> bool {
    request.title.is_some()
        || request.description.is_some()
        || request.priority.is_some()
        || request.customer_id.is_some()
        || request.provider_id.is_some()
        || request.address.is_some()
        || request.scheduled_start.is_some()
        || request.scheduled_end.is_some()
        || request.technician_ids.is_some()
        || request.price.is_some()
}

/// Empty strings clear an optional reference.
fn optional_ref(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The order with its notes and resources, newest first.
async fn with_details<C: ConnectionTrait>(
    db: &C,
    order: work_order::Model,
) -> Result<WorkOrderResponse, ServiceError> {
    let notes = work_order_note::Entity::find()
        .filter(work_order_note::Column::WorkOrderId.eq(order.id.clone()))
        .order_by_desc(work_order_note::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(NoteResponse::from)
        .collect();
    let resources = work_order_resource::Entity::find()
        .filter(work_order_resource::Column::WorkOrderId.eq(order.id.clone()))
        .order_by_desc(work_order_resource::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(ResourceResponse::from)
        .collect();

    Ok(WorkOrderResponse::from(order).with_details(notes, resources))
}

async fn ensure_references<C: ConnectionTrait>(
    conn: &C,
    customer_id: Option<&str>,
    provider_id: Option<&str>,
    technician_ids: &[String],
) -> Result<(), ServiceError> {
    if let Some(id) = customer_id {
        if customer::Entity::find_by_id(id.to_string())
            .one(conn)
            .await?
            .is_none()
        {
            return Err(ServiceError::ValidationError(format!(
                "customer {} does not exist",
                id
            )));
        }
    }
    if let Some(id) = provider_id {
        if provider::Entity::find_by_id(id.to_string())
            .one(conn)
            .await?
            .is_none()
        {
            return Err(ServiceError::ValidationError(format!(
                "provider {} does not exist",
                id
            )));
        }
    }
    let wanted: HashSet<&str> = technician_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    if !wanted.is_empty() {
        let found = user::Entity::find()
            .filter(user::Column::Id.is_in(wanted.iter().copied()))
            .count(conn)
            .await?;
        if found < wanted.len() as u64 {
            return Err(ServiceError::ValidationError(
                "technicianIds references unknown users".into(),
            ));
        }
    }
    Ok(())
}

impl WorkOrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        broadcaster: Arc<dyn Broadcaster>,
        invoice_due_days: i64,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            db_pool,
            broadcaster,
            invoice_due_days,
            upload_dir,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_work_orders(
        &self,
        filter: WorkOrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<work_order::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let (page, per_page) = page_window(page, per_page);

        let mut query = work_order::Entity::find();
        if let Some(status) = filter.status {
            let status: WorkOrderStatus = parse_enum("status", &status)?;
            query = query.filter(work_order::Column::Status.eq(status.to_string()));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(work_order::Column::CustomerId.eq(customer_id));
        }
        if let Some(technician_id) = filter.technician_id {
            // technician_ids is a JSON array of strings; match the quoted element
            let element = serde_json::to_string(&technician_id)?;
            query = query.filter(column_contains(work_order::Column::TechnicianIds, &element));
        }
        if let Some(from) = filter.from {
            query = query.filter(work_order::Column::ScheduledStart.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(work_order::Column::ScheduledStart.lte(to));
        }

        let total = query.clone().count(db).await?;
        let orders = query
            .order_by_desc(work_order::Column::CreatedAt)
            .offset((page - 1) * per_page)
            .limit(per_page)
            .all(db)
            .await?;

        Ok((orders, total))
    }

    #[instrument(skip(self))]
    pub async fn get_work_order(&self, id: &str) -> Result<work_order::Model, ServiceError> {
        work_order::Entity::find_by_id(id.to_string())
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Work order", id))
    }

    /// Single order with its notes and resources, newest first.
    #[instrument(skip(self))]
    pub async fn get_work_order_detail(&self, id: &str) -> Result<WorkOrderResponse, ServiceError> {
        let order = self.get_work_order(id).await?;
        with_details(&*self.db_pool, order).await
    }

    fn publish(&self, event: BroadcastEvent) {
        let kind = event.kind;
        let report = self.broadcaster.broadcast(event);
        if report.dropped > 0 {
            warn!(kind = kind.name(), dropped = report.dropped, "event stream subscribers dropped");
        }
    }

    fn publish_order(&self, make: fn(serde_json::Value) -> BroadcastEvent, order: &WorkOrderResponse) {
        match serde_json::to_value(order) {
            Ok(payload) => self.publish(make(payload)),
            Err(e) => error!(work_order_id = %order.id, error = %e, "failed to encode work order event"),
        }
    }

    /// Creates a work order and, when it has a customer, its draft invoice
    /// in the same transaction.
    #[instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create_work_order(
        &self,
        request: CreateWorkOrderRequest,
        created_by: Option<String>,
    ) -> Result<WorkOrderResponse, ServiceError> {
        let status = match request.status.as_deref() {
            Some(s) => parse_enum::<WorkOrderStatus>("status", s)?,
            None => WorkOrderStatus::default(),
        };
        let priority = match request.priority.as_deref() {
            Some(p) => parse_enum::<WorkOrderPriority>("priority", p)?,
            None => WorkOrderPriority::default(),
        };
        check_window(request.scheduled_start, request.scheduled_end)?;

        let customer_id = request.customer_id.and_then(optional_ref);
        let provider_id = request.provider_id.and_then(optional_ref);
        let id = request
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let txn = self.db_pool.begin().await?;

        if work_order::Entity::find_by_id(id.clone())
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "work order {} already exists",
                id
            )));
        }
        ensure_references(
            &txn,
            customer_id.as_deref(),
            provider_id.as_deref(),
            &request.technician_ids,
        )
        .await?;

        let now = Utc::now();
        let order = work_order::ActiveModel {
            id: Set(id),
            title: Set(request.title.trim().to_string()),
            description: Set(request.description),
            status: Set(status.to_string()),
            priority: Set(priority.to_string()),
            customer_id: Set(customer_id),
            provider_id: Set(provider_id),
            address: Set(request.address),
            scheduled_start: Set(request.scheduled_start),
            scheduled_end: Set(request.scheduled_end),
            technician_ids: Set(pack_technician_ids(&request.technician_ids)),
            price: Set(request.price.unwrap_or(Decimal::ZERO)),
            created_by: Set(created_by),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        invoices::spawn_for_work_order(&txn, &order, self.invoice_due_days).await?;
        txn.commit().await?;

        BUSINESS_METRICS.work_orders_created.inc();
        info!(work_order_id = %order.id, "work order created");

        let response = WorkOrderResponse::from(order).with_details(Vec::new(), Vec::new());
        self.publish_order(BroadcastEvent::work_order_created, &response);
        Ok(response)
    }

    /// Applies a partial update. Technicians may only move the status of
    /// orders they are assigned to.
    #[instrument(skip(self, request, actor), fields(actor = %actor.user_id))]
    pub async fn update_work_order(
        &self,
        id: &str,
        request: UpdateWorkOrderRequest,
        actor: &AuthUser,
    ) -> Result<WorkOrderResponse, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let existing = work_order::Entity::find_by_id(id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Work order", id))?;

        if !actor.can_dispatch() {
            if !existing.is_assigned_to(&actor.user_id) {
                return Err(ServiceError::Forbidden(
                    "work order is not assigned to you".into(),
                ));
            }
            if touches_more_than_status(&request) {
                return Err(ServiceError::Forbidden(
                    "technicians may only change the status".into(),
                ));
            }
        }

        let previous_price = existing.price;
        let had_customer = existing.customer_id.is_some();
        let start = request.scheduled_start.or(existing.scheduled_start);
        let end = request.scheduled_end.or(existing.scheduled_end);
        check_window(start, end)?;

        let customer_id = request.customer_id.map(optional_ref);
        let provider_id = request.provider_id.map(optional_ref);
        ensure_references(
            &txn,
            customer_id.clone().flatten().as_deref(),
            provider_id.clone().flatten().as_deref(),
            request.technician_ids.as_deref().unwrap_or_default(),
        )
        .await?;

        let mut active: work_order::ActiveModel = existing.into();
        if let Some(title) = request.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(status) = request.status {
            let status: WorkOrderStatus = parse_enum("status", &status)?;
            active.status = Set(status.to_string());
        }
        if let Some(priority) = request.priority {
            let priority: WorkOrderPriority = parse_enum("priority", &priority)?;
            active.priority = Set(priority.to_string());
        }
        if let Some(customer_id) = customer_id {
            active.customer_id = Set(customer_id);
        }
        if let Some(provider_id) = provider_id {
            active.provider_id = Set(provider_id);
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if request.scheduled_start.is_some() {
            active.scheduled_start = Set(start);
        }
        if request.scheduled_end.is_some() {
            active.scheduled_end = Set(end);
        }
        if let Some(technician_ids) = request.technician_ids {
            active.technician_ids = Set(pack_technician_ids(&technician_ids));
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        active.updated_at = Set(Utc::now());

        let order = active.update(&txn).await?;

        if order.price != previous_price {
            let synced = invoices::sync_draft_totals(&txn, &order.id, order.price).await?;
            info!(work_order_id = %order.id, invoices = synced, "draft invoice totals synced");
        }
        if !had_customer && order.customer_id.is_some() {
            let linked = invoice::Entity::find()
                .filter(invoice::Column::WorkOrderId.eq(order.id.clone()))
                .count(&txn)
                .await?;
            if linked == 0 {
                invoices::spawn_for_work_order(&txn, &order, self.invoice_due_days).await?;
            }
        }
        // only publishing follows the commit
        let response = with_details(&txn, order).await?;
        txn.commit().await?;

        info!(work_order_id = %response.id, "work order updated");
        self.publish_order(BroadcastEvent::work_order_updated, &response);
        Ok(response)
    }

    /// Removes the order with its notes, resources and stored files.
    /// Invoices survive with their work order reference cleared.
    #[instrument(skip(self))]
    pub async fn delete_work_order(&self, id: &str) -> Result<(), ServiceError> {
        let txn = self.db_pool.begin().await?;

        if work_order::Entity::find_by_id(id.to_string())
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(ServiceError::not_found("Work order", id));
        }

        work_order_note::Entity::delete_many()
            .filter(work_order_note::Column::WorkOrderId.eq(id))
            .exec(&txn)
            .await?;
        work_order_resource::Entity::delete_many()
            .filter(work_order_resource::Column::WorkOrderId.eq(id))
            .exec(&txn)
            .await?;
        invoice::Entity::update_many()
            .col_expr(invoice::Column::WorkOrderId, Expr::value(Option::<String>::None))
            .col_expr(invoice::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(invoice::Column::WorkOrderId.eq(id))
            .exec(&txn)
            .await?;
        work_order::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await?;

        txn.commit().await?;

        let dir = self.upload_dir.join(id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %dir.display(), error = %e, "failed to remove work order files");
            }
        }

        BUSINESS_METRICS.work_orders_deleted.inc();
        info!(work_order_id = %id, "work order deleted");
        self.publish(BroadcastEvent::work_order_deleted(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn schedule_window_must_not_run_backwards() {
        let start = Utc::now();
        assert!(check_window(Some(start), Some(start + Duration::hours(2))).is_ok());
        assert!(check_window(Some(start), Some(start)).is_ok());
        assert!(check_window(Some(start), None).is_ok());
        assert!(check_window(Some(start), Some(start - Duration::minutes(1))).is_err());
    }

    #[test]
    fn technicians_are_limited_to_status_changes() {
        let status_only = UpdateWorkOrderRequest {
            status: Some("in_progress".into()),
            ..Default::default()
        };
        assert!(!touches_more_than_status(&status_only));
        let repriced = UpdateWorkOrderRequest {
            price: Some(Decimal::ONE),
            ..status_only
        };
        assert!(touches_more_than_status(&repriced));
    }

    #[test]
    fn blank_references_clear_the_field() {
        assert_eq!(optional_ref("  ".into()), None);
        assert_eq!(optional_ref(" c1 ".into()), Some("c1".into()));
    }
}
