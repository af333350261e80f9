/*!
 * # Metrics Module
 *
 * In-process metrics for the field service API.
 *
 * ## Features
 *
 * - HTTP request/response counts by status class
 * - Event stream fan-out (broadcasts, deliveries, dropped subscribers)
 * - Business counters (work orders, invoices, notes, attachments)
 *
 * ## Metrics Formats
 *
 * - Prometheus text format at `/metrics`
 * - JSON format at `/metrics/json`
 */

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::Duration;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicU64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: f64) {
        self.value.store(value as u64, Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        self.value.load(Ordering::Relaxed) as f64
    }
}

/// Count and sum only; bucket boundaries are left to the scraper.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    sum_micros: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, value: f64) {
        self.sum_micros
            .fetch_add((value * 1_000_000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    gauges: DashMap<String, Gauge>,
    histograms: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_insert_with(Counter::new)
            .clone()
    }

    pub fn get_or_create_gauge(&self, name: &str) -> Gauge {
        self.gauges
            .entry(name.to_string())
            .or_insert_with(Gauge::new)
            .clone()
    }

    pub fn get_or_create_histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .clone()
    }

    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        let mut output = String::new();

        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.get()));
        }

        for entry in self.gauges.iter() {
            let (name, gauge) = entry.pair();
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{} {}\n", name, gauge.get()));
        }

        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            output.push_str(&format!("# TYPE {} histogram\n", name));
            output.push_str(&format!("{}_count {}\n", name, histogram.get_count()));
            output.push_str(&format!("{}_sum {}\n", name, histogram.get_sum()));
        }

        if output.is_empty() {
            return Err(MetricsError::ExportError("no metrics registered".into()));
        }
        Ok(output)
    }

    pub fn export_metrics_json(&self) -> serde_json::Value {
        let counters: serde_json::Map<_, _> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), json!(e.value().get())))
            .collect();
        let gauges: serde_json::Map<_, _> = self
            .gauges
            .iter()
            .map(|e| (e.key().clone(), json!(e.value().get())))
            .collect();
        let histograms: serde_json::Map<_, _> = self
            .histograms
            .iter()
            .map(|e| {
                (
                    e.key().clone(),
                    json!({ "count": e.value().get_count(), "sum": e.value().get_sum() }),
                )
            })
            .collect();

        json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

lazy_static::lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub fn set_gauge(name: &str, value: f64) {
    METRICS.get_or_create_gauge(name).set(value);
}

pub struct HttpMetrics {
    pub requests_total: Counter,
    pub request_duration: Histogram,
    pub status_2xx: Counter,
    pub status_4xx: Counter,
    pub status_5xx: Counter,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: METRICS.get_or_create_counter("http_requests_total"),
            request_duration: METRICS.get_or_create_histogram("http_request_duration_seconds"),
            status_2xx: METRICS.get_or_create_counter("http_status_2xx_total"),
            status_4xx: METRICS.get_or_create_counter("http_status_4xx_total"),
            status_5xx: METRICS.get_or_create_counter("http_status_5xx_total"),
        }
    }

    pub fn record_request(&self, duration: Duration, status_code: u16) {
        self.requests_total.inc();
        self.request_duration.observe(duration.as_secs_f64());

        match status_code {
            200..=299 => self.status_2xx.inc(),
            400..=499 => self.status_4xx.inc(),
            500..=599 => self.status_5xx.inc(),
            _ => {}
        }
    }
}

/// Event stream fan-out counters
pub struct BroadcastMetrics {
    pub events_total: Counter,
    pub deliveries_total: Counter,
    pub dropped_subscribers_total: Counter,
    pub active_subscribers: Gauge,
}

impl BroadcastMetrics {
    pub fn new() -> Self {
        Self {
            events_total: METRICS.get_or_create_counter("broadcast_events_total"),
            deliveries_total: METRICS.get_or_create_counter("broadcast_deliveries_total"),
            dropped_subscribers_total: METRICS
                .get_or_create_counter("broadcast_dropped_subscribers_total"),
            active_subscribers: METRICS.get_or_create_gauge("broadcast_active_subscribers"),
        }
    }

    pub fn record_broadcast(&self, delivered: usize, dropped: usize) {
        self.events_total.inc();
        self.deliveries_total.inc_by(delivered as u64);
        self.dropped_subscribers_total.inc_by(dropped as u64);
    }

    pub fn set_active_subscribers(&self, count: usize) {
        self.active_subscribers.set(count as f64);
    }
}

pub struct BusinessMetrics {
    pub work_orders_created: Counter,
    pub work_orders_deleted: Counter,
    pub invoices_created: Counter,
    pub notes_added: Counter,
    pub resources_uploaded: Counter,
}

impl BusinessMetrics {
    pub fn new() -> Self {
        Self {
            work_orders_created: METRICS.get_or_create_counter("work_orders_created_total"),
            work_orders_deleted: METRICS.get_or_create_counter("work_orders_deleted_total"),
            invoices_created: METRICS.get_or_create_counter("invoices_created_total"),
            notes_added: METRICS.get_or_create_counter("work_order_notes_added_total"),
            resources_uploaded: METRICS.get_or_create_counter("work_order_resources_uploaded_total"),
        }
    }
}

lazy_static::lazy_static! {
    pub static ref HTTP_METRICS: HttpMetrics = HttpMetrics::new();
    pub static ref BROADCAST_METRICS: BroadcastMetrics = BroadcastMetrics::new();
    pub static ref BUSINESS_METRICS: BusinessMetrics = BusinessMetrics::new();
}

/// Records request count, latency and status class for every response.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    HTTP_METRICS.record_request(start.elapsed(), response.status().as_u16());
    response
}

pub async fn metrics_handler() -> Result<Response, MetricsError> {
    let body = METRICS.export_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

pub async fn metrics_json_handler() -> Json<serde_json::Value> {
    Json(METRICS.export_metrics_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_lists_every_metric_kind() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("jobs_total").inc_by(3);
        registry.get_or_create_gauge("queue_depth").set(7.0);
        registry.get_or_create_histogram("latency_seconds").observe(0.5);

        let text = registry.export_metrics().unwrap();
        assert!(text.contains("# TYPE jobs_total counter\njobs_total 3\n"));
        assert!(text.contains("queue_depth 7"));
        assert!(text.contains("latency_seconds_count 1"));
        assert!(text.contains("latency_seconds_sum 0.5"));

        let json = registry.export_metrics_json();
        assert_eq!(json["counters"]["jobs_total"], 3);
        assert_eq!(json["histograms"]["latency_seconds"]["count"], 1);
    }

    #[test]
    fn counters_are_shared_by_name() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("a").inc();
        registry.get_or_create_counter("a").inc();
        assert_eq!(registry.get_or_create_counter("a").get(), 2);
    }
}
