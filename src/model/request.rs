//! `RoutingRequest`: the inbound-normalized request, per the data model's
//! entity table. Built once at HTTP ingress and discarded once the response
//! is written back to the caller; never mutated after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Caller-declared priority, used by the Core Router's scoring algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    /// Score bonus per the rule-matching algorithm: +20/+10/+5.
    pub fn score_bonus(&self) -> i32 {
        match self {
            Priority::High => 20,
            Priority::Normal => 10,
            Priority::Low => 5,
        }
    }
}

/// Wire protocol a request arrived in or must be returned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    Anthropic,
    OpenAi,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub origin_format: Option<WireFormat>,
    pub target_format: Option<WireFormat>,
    pub session_id: Option<String>,
    pub trace_id: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub custom_attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConstraints {
    #[serde(default)]
    pub preferred_providers: Vec<String>,
    #[serde(default)]
    pub excluded_providers: Vec<String>,
    #[serde(default)]
    pub required_features: Vec<String>,
    pub max_latency_ms: Option<u64>,
    pub cost_preference: Option<String>,
}

/// Inbound-normalized request. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub request_id: String,
    pub model: String,
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub metadata: RequestMetadata,
    pub constraints: Option<RoutingConstraints>,
    pub timestamp: DateTime<Utc>,
}

impl RoutingRequest {
    /// Construct a new request, validating the invariant that `request_id`
    /// and `model` are non-empty.
    pub fn new(request_id: String, model: String) -> Result<Self, String> {
        if request_id.is_empty() {
            return Err("request_id must not be empty".to_string());
        }
        if model.is_empty() {
            return Err("model must not be empty".to_string());
        }
        Ok(Self {
            request_id,
            model,
            category: None,
            priority: Priority::default(),
            metadata: RequestMetadata::default(),
            constraints: None,
            timestamp: Utc::now(),
        })
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
