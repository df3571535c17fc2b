//! `RoutingDecision`, `PipelineId`, and the bounded decision-history ring
//! buffer, per §3.1 / §3.3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Builds a `<provider>-<model-sanitized>-<keyIndex>` pipeline id.
pub fn pipeline_id(provider_id: &str, model: &str, key_index: usize) -> String {
    let sanitized: String = model
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("{provider_id}-{sanitized}-{key_index}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub request_id: String,
    pub selected_provider_id: String,
    pub selected_model: String,
    pub selected_route_id: String,
    pub reasoning: String,
    /// Clamped to [0, 100].
    pub confidence: u8,
    pub estimated_latency_ms: u64,
    pub decision_timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    /// Ordered remaining eligible candidate route ids, best-score first.
    /// The Execution Manager resolves each through the `RouteTable` and
    /// derives its own `PipelineId` (provider + model + key index) for
    /// health/blacklist bookkeeping.
    pub sibling_pipeline_ids: Vec<String>,
}

impl RoutingDecision {
    /// All candidate route ids for this decision, selected route first.
    pub fn all_route_ids(&self) -> Vec<String> {
        let mut ids = vec![self.selected_route_id.clone()];
        ids.extend(self.sibling_pipeline_ids.clone());
        ids
    }
}

/// Bounded ring buffer of recent decisions, guarded by a single mutex per
/// §5 (writers append, readers snapshot).
pub struct DecisionHistory {
    capacity: usize,
    entries: Mutex<VecDeque<RoutingDecision>>,
}

impl DecisionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn push(&self, decision: RoutingDecision) {
        let mut entries = self.entries.lock().expect("decision history mutex poisoned");
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(decision);
    }

    pub fn snapshot(&self) -> Vec<RoutingDecision> {
        self.entries
            .lock()
            .expect("decision history mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("decision history mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
