//! Metrics collection: Prometheus export plus a JSON stats snapshot.
//!
//! Endpoints:
//! - `GET /metrics` - Prometheus text format
//! - `GET /status`, `GET /health` - JSON operational status (§6.1)
//!
//! Counters: `requests_total{status}`, `provider_execution_total{pipeline,outcome}`,
//! `pipeline_blacklist_total`, `pipeline_destroy_total`, `execution_attempts_total`.
//! Histograms: `request_duration_seconds`.

pub mod handler;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Central coordinator for metrics collection and Prometheus rendering.
pub struct MetricsCollector {
    start_time: Instant,
    total_requests: AtomicU64,
    prometheus_handle: PrometheusHandle,
}

impl MetricsCollector {
    pub fn new() -> Self {
        // Installing a global recorder twice (e.g. across tests in the same
        // process) errors rather than panicking; fall back to a
        // locally-built recorder so repeated construction stays safe.
        let prometheus_handle = PrometheusBuilder::new().install_recorder().unwrap_or_else(|_| {
            PrometheusBuilder::new().build_recorder().handle()
        });
        Self {
            start_time: Instant::now(),
            total_requests: AtomicU64::new(0),
            prometheus_handle,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn render_metrics(&self) -> String {
        self.prometheus_handle.render()
    }

    pub fn record_inbound_request(&self, status: u16) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("requests_total", "status" => status.to_string()).increment(1);
    }

    pub fn record_request_duration(&self, seconds: f64) {
        metrics::histogram!("request_duration_seconds").record(seconds);
    }

    pub fn record_provider_execution(&self, pipeline_id: &str, outcome: &str) {
        metrics::counter!(
            "provider_execution_total",
            "pipeline" => pipeline_id.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }

    pub fn record_pipeline_blacklist(&self, pipeline_id: &str) {
        metrics::counter!("pipeline_blacklist_total", "pipeline" => pipeline_id.to_string()).increment(1);
    }

    pub fn record_pipeline_destroy(&self, pipeline_id: &str) {
        metrics::counter!("pipeline_destroy_total", "pipeline" => pipeline_id.to_string()).increment(1);
    }

    pub fn record_execution_attempt(&self, pipeline_id: &str, action: &str) {
        metrics::counter!(
            "execution_attempts_total",
            "pipeline" => pipeline_id.to_string(),
            "action" => action.to_string()
        )
        .increment(1);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub status: String,
    pub checks: Vec<HealthCheck>,
}

/// JSON status object per §6.1.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_running: bool,
    pub port: u16,
    pub uptime: u64,
    pub version: String,
    pub total_requests: u64,
    pub active_pipelines: usize,
    pub health: HealthSummary,
}
