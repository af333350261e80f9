pub mod auth;
pub mod common;
pub mod customers;
pub mod events;
pub mod invoices;
pub mod locations;
pub mod notes;
pub mod providers;
pub mod resources;
pub mod users;
pub mod work_orders;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::Broadcaster,
    services::{
        customers::CustomerService, invoices::InvoiceService, locations::LocationService,
        notes::NoteService, providers::ProviderService, resources::ResourceService,
        users::UserService, work_orders::WorkOrderService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<UserService>,
    pub customers: Arc<CustomerService>,
    pub providers: Arc<ProviderService>,
    pub work_orders: Arc<WorkOrderService>,
    pub notes: Arc<NoteService>,
    pub resources: Arc<ResourceService>,
    pub invoices: Arc<InvoiceService>,
    pub locations: Arc<LocationService>,
}

impl AppServices {
    /// Work order mutations are published through `broadcaster`.
    pub fn new(db_pool: Arc<DbPool>, broadcaster: Arc<dyn Broadcaster>, config: &AppConfig) -> Self {
        Self {
            users: Arc::new(UserService::new(db_pool.clone())),
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            providers: Arc::new(ProviderService::new(db_pool.clone())),
            work_orders: Arc::new(WorkOrderService::new(
                db_pool.clone(),
                broadcaster,
                config.invoice_due_days,
                config.upload_dir(),
            )),
            notes: Arc::new(NoteService::new(db_pool.clone())),
            resources: Arc::new(ResourceService::new(
                db_pool.clone(),
                config.upload_dir(),
                config.max_upload_bytes,
            )),
            invoices: Arc::new(InvoiceService::new(db_pool, config.invoice_due_days)),
            locations: Arc::new(LocationService::new(config.location_ttl())),
        }
    }
}
