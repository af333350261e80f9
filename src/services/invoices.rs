use crate::{
    db::DbPool,
    dto::{CreateInvoiceRequest, UpdateInvoiceRequest},
    errors::ServiceError,
    metrics::BUSINESS_METRICS,
    models::{customer, invoice, work_order, InvoiceStatus},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::IntoParams;
use uuid::Uuid;

use super::{page_window, parse_enum};

/// Query filters for invoice listing
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvoiceFilter {
    pub work_order_id: Option<String>,
    pub customer_id: Option<String>,
    pub status: Option<String>,
}

/// `INV-<yyyymmdd>-<6 hex>`
pub fn generate_invoice_number(at: DateTime<Utc>) -> String {
    format!(
        "INV-{}-{}",
        at.format("%Y%m%d"),
        hex::encode(rand::random::<[u8; 3]>())
    )
}

/// Creates the draft invoice that follows a work order with a customer.
/// Runs on whatever connection the caller is in, usually its transaction.
pub async fn spawn_for_work_order<C: ConnectionTrait>(
    conn: &C,
    order: &work_order::Model,
    due_days: i64,
) -> Result<Option<invoice::Model>, ServiceError> {
    let Some(customer_id) = order.customer_id.clone() else {
        return Ok(None);
    };

    let now = Utc::now();
    let model = invoice::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        number: Set(generate_invoice_number(now)),
        work_order_id: Set(Some(order.id.clone())),
        customer_id: Set(Some(customer_id)),
        status: Set(InvoiceStatus::Draft.to_string()),
        total: Set(order.price),
        issued_at: Set(now),
        due_at: Set(Some(now + Duration::days(due_days))),
        paid_at: Set(None),
        notes: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    BUSINESS_METRICS.invoices_created.inc();
    info!(invoice_id = %model.id, work_order_id = %order.id, total = %model.total, "invoice spawned for work order");
    Ok(Some(model))
}

/// Keeps draft invoice totals in step with the work order price.
pub async fn sync_draft_totals<C: ConnectionTrait>(
    conn: &C,
    work_order_id: &str,
    total: Decimal,
) -> Result<u64, ServiceError> {
    let result = invoice::Entity::update_many()
        .col_expr(invoice::Column::Total, Expr::value(total))
        .col_expr(invoice::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(invoice::Column::WorkOrderId.eq(work_order_id))
        .filter(invoice::Column::Status.eq(InvoiceStatus::Draft.to_string()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Service for managing invoices
#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DbPool>,
    due_days: i64,
}

impl InvoiceService {
    pub fn new(db_pool: Arc<DbPool>, due_days: i64) -> Self {
        Self { db_pool, due_days }
    }

    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        filter: InvoiceFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<invoice::Model>, u64), ServiceError> {
        let db = &*self.db_pool;
        let (page, per_page) = page_window(page, per_page);

        let mut query = invoice::Entity::find();
        if let Some(work_order_id) = filter.work_order_id {
            query = query.filter(invoice::Column::WorkOrderId.eq(work_order_id));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(invoice::Column::CustomerId.eq(customer_id));
        }
        if let Some(status) = filter.status {
            let status: InvoiceStatus = parse_enum("status", &status)?;
            query = query.filter(invoice::Column::Status.eq(status.to_string()));
        }

        let total = query.clone().count(db).await?;
        let invoices = query
            .order_by_desc(invoice::Column::IssuedAt)
            .offset((page - 1) * per_page)
            .limit(per_page)
            .all(db)
            .await?;

        Ok((invoices, total))
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, id: &str) -> Result<invoice::Model, ServiceError> {
        invoice::Entity::find_by_id(id.to_string())
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice", id))
    }

    /// Manual invoice. Customer defaults to the work order's customer.
    #[instrument(skip(self, request))]
    pub async fn create_invoice(
        &self,
        request: CreateInvoiceRequest,
    ) -> Result<invoice::Model, ServiceError> {
        let db = &*self.db_pool;
        if request.total.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "total must not be negative".into(),
            ));
        }

        let mut customer_id = request.customer_id;
        if let Some(work_order_id) = &request.work_order_id {
            let order = work_order::Entity::find_by_id(work_order_id.clone())
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "work order {} does not exist",
                        work_order_id
                    ))
                })?;
            if customer_id.is_none() {
                customer_id = order.customer_id;
            }
        }
        if let Some(id) = &customer_id {
            if customer::Entity::find_by_id(id.clone()).one(db).await?.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "customer {} does not exist",
                    id
                )));
            }
        }

        let now = Utc::now();
        let model = invoice::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            number: Set(generate_invoice_number(now)),
            work_order_id: Set(request.work_order_id),
            customer_id: Set(customer_id),
            status: Set(InvoiceStatus::Draft.to_string()),
            total: Set(request.total),
            issued_at: Set(now),
            due_at: Set(Some(
                request
                    .due_at
                    .unwrap_or_else(|| now + Duration::days(self.due_days)),
            )),
            paid_at: Set(None),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        BUSINESS_METRICS.invoices_created.inc();
        info!(invoice_id = %model.id, number = %model.number, "invoice created");
        Ok(model)
    }

    /// Applies field edits and status transitions. Totals are frozen once
    /// an invoice leaves draft.
    #[instrument(skip(self, request))]
    pub async fn update_invoice(
        &self,
        id: &str,
        request: UpdateInvoiceRequest,
    ) -> Result<invoice::Model, ServiceError> {
        let existing = self.get_invoice(id).await?;
        let current = existing.status();
        let mut active: invoice::ActiveModel = existing.into();
        let now = Utc::now();

        if let Some(status) = request.status {
            let next: InvoiceStatus = parse_enum("status", &status)?;
            if !current.can_transition_to(next) {
                return Err(ServiceError::InvalidOperation(format!(
                    "invoice cannot move from {} to {}",
                    current, next
                )));
            }
            if next == InvoiceStatus::Paid && current != InvoiceStatus::Paid {
                active.paid_at = Set(Some(now));
            }
            active.status = Set(next.to_string());
        }
        if let Some(total) = request.total {
            if current != InvoiceStatus::Draft {
                return Err(ServiceError::InvalidOperation(
                    "only draft invoices can change their total".into(),
                ));
            }
            if total.is_sign_negative() {
                return Err(ServiceError::ValidationError(
                    "total must not be negative".into(),
                ));
            }
            active.total = Set(total);
        }
        if let Some(due_at) = request.due_at {
            active.due_at = Set(Some(due_at));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(now);

        Ok(active.update(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, id: &str) -> Result<(), ServiceError> {
        let existing = self.get_invoice(id).await?;
        if !existing.status().is_deletable() {
            return Err(ServiceError::InvalidOperation(format!(
                "{} invoices cannot be deleted; void it instead",
                existing.status()
            )));
        }
        invoice::Entity::delete_by_id(existing.id)
            .exec(&*self.db_pool)
            .await?;
        info!(invoice_id = %id, "invoice deleted");
        Ok(())
    }
}
