//! Health Manager (§4.10): per-pipeline ring buffer + counters,
//! guarded by per-pipeline fine-grained locks via `DashMap` (§5).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;

const DEFAULT_LATENCY_WINDOW: usize = 100;
const DEFAULT_MIN_REQUESTS_FOR_HEALTH_CHECK: u64 = 5;
const DEFAULT_HEALTH_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct PipelineHealthStats {
    pub total_requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_request_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    latency_window: VecDeque<u64>,
    consecutive_failures: u32,
}

impl Default for PipelineHealthStats {
    fn default() -> Self {
        Self {
            total_requests: 0,
            success_count: 0,
            error_count: 0,
            last_request_at: None,
            last_success_at: None,
            last_error_at: None,
            latency_window: VecDeque::with_capacity(DEFAULT_LATENCY_WINDOW),
            consecutive_failures: 0,
        }
    }
}

impl PipelineHealthStats {
    /// Only meaningful once `total_requests >= minRequestsForHealthCheck`.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.success_count as f64 / self.total_requests as f64
    }

    pub fn average_response_time_ms(&self) -> Option<f64> {
        if self.latency_window.is_empty() {
            return None;
        }
        let sum: u64 = self.latency_window.iter().sum();
        Some(sum as f64 / self.latency_window.len() as f64)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Tracks `PipelineHealthStats` per pipeline id and answers eligibility
/// queries per the §3.2 invariant: `available && !blacklisted &&
/// (totalRequests < minRequests || successRate >= healthThreshold)`.
pub struct HealthManager {
    stats: DashMap<String, PipelineHealthStats>,
    min_requests_for_health_check: u64,
    health_threshold: f64,
    latency_window: usize,
}

impl HealthManager {
    pub fn new() -> Self {
        Self {
            stats: DashMap::new(),
            min_requests_for_health_check: DEFAULT_MIN_REQUESTS_FOR_HEALTH_CHECK,
            health_threshold: DEFAULT_HEALTH_THRESHOLD,
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }

    pub fn is_healthy(&self, pipeline_id: &str) -> bool {
        match self.stats.get(pipeline_id) {
            None => true,
            Some(stats) => {
                stats.total_requests < self.min_requests_for_health_check
                    || stats.success_rate() >= self.health_threshold
            }
        }
    }

    /// Preserves input order.
    pub fn filter_healthy(&self, ids: &[String]) -> Vec<String> {
        ids.iter().filter(|id| self.is_healthy(id)).cloned().collect()
    }

    pub fn record_success(&self, pipeline_id: &str, latency: Duration) {
        let mut stats = self.stats.entry(pipeline_id.to_string()).or_default();
        stats.total_requests += 1;
        stats.success_count += 1;
        stats.consecutive_failures = 0;
        let now = Utc::now();
        stats.last_request_at = Some(now);
        stats.last_success_at = Some(now);
        if stats.latency_window.len() >= self.latency_window {
            stats.latency_window.pop_front();
        }
        stats.latency_window.push_back(latency.as_millis() as u64);
    }

    pub fn record_failure(&self, pipeline_id: &str) {
        let mut stats = self.stats.entry(pipeline_id.to_string()).or_default();
        stats.total_requests += 1;
        stats.error_count += 1;
        stats.consecutive_failures += 1;
        let now = Utc::now();
        stats.last_request_at = Some(now);
        stats.last_error_at = Some(now);
    }

    pub fn stats_for(&self, pipeline_id: &str) -> Option<PipelineHealthStats> {
        self.stats.get(pipeline_id).map(|s| s.clone())
    }

    /// Automatic recovery: ages a pipeline's counters out entirely once
    /// `reset_interval` has elapsed since its last failure with no new
    /// failures, returning it to a "new" baseline.
    pub fn age_out_if_recovered(&self, pipeline_id: &str, reset_interval: Duration) {
        if let Some(mut stats) = self.stats.get_mut(pipeline_id) {
            if let Some(last_error) = stats.last_error_at {
                let elapsed = Utc::now().signed_duration_since(last_error);
                if elapsed.to_std().unwrap_or_default() >= reset_interval && stats.consecutive_failures == 0 {
                    *stats = PipelineHealthStats::default();
                }
            }
        }
    }
}

impl Default for HealthManager {
    fn default() -> Self {
        Self::new()
    }
}
