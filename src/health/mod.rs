/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`): process is up, with uptime
 * - Readiness check (`/health/ready`): database answers a ping
 * - Details (`/health/details`): per-component status, including the
 *   number of open event streams
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::events::SubscriberRegistry;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub details: BTreeMap<String, HealthDetail>,
}

/// Health check state
#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Arc<DatabaseConnection>,
    pub events: Arc<SubscriberRegistry>,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(db_pool: Arc<DatabaseConnection>, events: Arc<SubscriberRegistry>) -> Self {
        Self {
            db_pool,
            events,
            start_time: Instant::now(),
        }
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn collect(&self) -> HealthInfo {
        let mut details = BTreeMap::new();

        let database = match crate::db::check_connection(&self.db_pool).await {
            Ok(()) => HealthDetail {
                status: HealthStatus::Up,
                message: None,
            },
            Err(e) => {
                error!("Database health check failed: {}", e);
                HealthDetail {
                    status: HealthStatus::Down,
                    message: Some("database ping failed".into()),
                }
            }
        };
        details.insert("database".to_string(), database);
        details.insert(
            "event_streams".to_string(),
            HealthDetail {
                status: HealthStatus::Up,
                message: Some(format!("{} open", self.events.subscriber_count())),
            },
        );

        let status = if details.values().any(|d| d.status == HealthStatus::Down) {
            HealthStatus::Down
        } else {
            HealthStatus::Up
        };

        HealthInfo {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: self.uptime(),
            details,
        }
    }
}

fn status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Basic health check endpoint
pub async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    debug!("Health check endpoint called");
    Json(json!({
        "status": HealthStatus::Up,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.uptime(),
        "timestamp": Utc::now(),
    }))
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.collect().await;
    (
        status_code(health.status),
        Json(json!({
            "ready": health.status == HealthStatus::Up,
            "timestamp": health.timestamp,
        })),
    )
}

/// Detailed health check endpoint
pub async fn detailed_health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.collect().await;
    (status_code(health.status), Json(health))
}

pub fn health_routes(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/health/details", get(detailed_health))
        .with_state(state)
}
