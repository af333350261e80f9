//! Field Service API Library
//!
//! Work orders, the people and companies around them, and a live event
//! stream that keeps dispatch screens in sync. The [`client`] module is the
//! consuming side of that stream.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{delete, get, post, put},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};

use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::events::SubscriberRegistry;
use crate::models::UserRole;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub events: Arc<SubscriberRegistry>,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires the event registry, auth and domain services around one pool.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let events = Arc::new(SubscriberRegistry::new(config.event_buffer_capacity));
        let services = handlers::AppServices::new(db.clone(), events.clone(), &config);
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        Self {
            db,
            config,
            events,
            services,
            auth,
        }
    }
}

pub fn api_v1_routes(max_upload_bytes: usize) -> Router<AppState> {
    use handlers::{
        auth as auth_h, customers, events as events_h, invoices, locations, notes, providers,
        resources, users, work_orders,
    };

    const DISPATCH: &[UserRole] = &[UserRole::Dispatcher];
    const EVERYONE: &[UserRole] = &[UserRole::Dispatcher, UserRole::Technician];

    let public = Router::new().route("/auth/login", post(auth_h::login));

    let session = Router::new()
        .route("/auth/me", get(auth_h::me))
        .route("/events", get(events_h::stream_events))
        .route("/locations/me", put(locations::report_location))
        .with_auth();

    // Users are visible to dispatchers and managed by admins
    let users_read = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .with_roles(DISPATCH);

    let users_write = Router::new()
        .route("/users", post(users::create_user))
        .route("/users/:id", put(users::update_user).delete(users::delete_user))
        .with_roles(&[]);

    let directory_read = Router::new()
        .route("/customers", get(customers::list_customers))
        .route("/customers/:id", get(customers::get_customer))
        .route("/providers", get(providers::list_providers))
        .route("/providers/:id", get(providers::get_provider))
        .with_roles(EVERYONE);

    let directory_write = Router::new()
        .route("/customers", post(customers::create_customer))
        .route(
            "/customers/:id",
            put(customers::update_customer).delete(customers::delete_customer),
        )
        .route("/providers", post(providers::create_provider))
        .route(
            "/providers/:id",
            put(providers::update_provider).delete(providers::delete_provider),
        )
        .with_roles(DISPATCH);

    // Technicians may update orders they are assigned to; the service
    // narrows what they can change.
    let work_orders_read = Router::new()
        .route("/work-orders", get(work_orders::list_work_orders))
        .route(
            "/work-orders/:id",
            get(work_orders::get_work_order).put(work_orders::update_work_order),
        )
        .with_roles(EVERYONE);

    let work_orders_dispatch = Router::new()
        .route("/work-orders", post(work_orders::create_work_order))
        .route("/work-orders/:id", delete(work_orders::delete_work_order))
        .with_roles(DISPATCH);

    let attachments = Router::new()
        .route(
            "/work-orders/:id/notes",
            get(notes::list_notes).post(notes::add_note),
        )
        .route(
            "/work-orders/:id/notes/:note_id",
            delete(notes::delete_note),
        )
        .route(
            "/work-orders/:id/resources",
            get(resources::list_resources).post(resources::upload_resource),
        )
        .route(
            "/work-orders/:id/resources/:resource_id",
            delete(resources::delete_resource),
        )
        .route(
            "/work-orders/:id/resources/:resource_id/file",
            get(resources::download_resource),
        )
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
        .with_roles(EVERYONE);

    let billing = Router::new()
        .route(
            "/invoices",
            get(invoices::list_invoices).post(invoices::create_invoice),
        )
        .route(
            "/invoices/:id",
            get(invoices::get_invoice)
                .put(invoices::update_invoice)
                .delete(invoices::delete_invoice),
        )
        .with_roles(DISPATCH);

    let tracking = Router::new()
        .route("/locations", get(locations::list_locations))
        .route("/locations/:user_id", get(locations::get_location))
        .with_roles(DISPATCH);

    Router::new()
        .merge(public)
        .merge(session)
        .merge(users_read)
        .merge(users_write)
        .merge(directory_read)
        .merge(directory_write)
        .merge(work_orders_read)
        .merge(work_orders_dispatch)
        .merge(attachments)
        .merge(billing)
        .merge(tracking)
}

/// CORS from configuration: explicit origins when given, permissive only
/// outside production.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
                axum::http::header::ACCEPT,
                axum::http::HeaderName::from_static(middleware_helpers::REQUEST_ID_HEADER),
            ])
            .allow_credentials(cfg.cors_allow_credentials)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!("Using permissive CORS because explicit origins were not configured");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        ::tracing::warn!("No CORS origins configured; cross-origin requests will be rejected");
        CorsLayer::new().allow_methods(methods)
    }
}

/// The complete HTTP application: API, health, metrics and docs.
pub fn app_router(state: AppState) -> Router {
    let health_state = Arc::new(health::HealthState::new(
        state.db.clone(),
        state.events.clone(),
    ));
    let cors = cors_layer(&state.config);
    let auth_service = state.auth.clone();

    Router::new()
        .nest("/api/v1", api_v1_routes(state.config.max_upload_bytes))
        .with_state(state)
        .merge(health::health_routes(health_state))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/metrics/json", get(metrics::metrics_json_handler))
        .merge(openapi::swagger_ui())
        .layer(Extension(auth_service))
        .layer(axum::middleware::from_fn(metrics::track_metrics))
        // The default predicate leaves text/event-stream uncompressed
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}
