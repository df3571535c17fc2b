//! `RouteInfo`: a concrete backend endpoint descriptor, per §3.1.
//! Mutated only by the health manager and configuration reloads.

use dashmap::DashMap;
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// +50 / +20 / −30, per the target-route-selection algorithm.
    pub fn selection_bonus(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 50.0,
            HealthStatus::Degraded => 20.0,
            HealthStatus::Unhealthy => -30.0,
        }
    }

    /// Confidence multiplier {1.2, 0.8, 0.5}.
    pub fn confidence_factor(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 1.2,
            HealthStatus::Degraded => 0.8,
            HealthStatus::Unhealthy => 0.5,
        }
    }

    /// Estimated latency prior in ms (healthy→50, degraded→150, unhealthy→500).
    pub fn estimated_latency_ms(&self) -> u64 {
        match self {
            HealthStatus::Healthy => 50,
            HealthStatus::Degraded => 150,
            HealthStatus::Unhealthy => 500,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteMetadata {
    pub endpoint_url: String,
    pub api_key_ref: Option<String>,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfo {
    pub id: String,
    pub provider_id: String,
    pub provider_type: String,
    /// Glob patterns (`*` = any), per §3.1.
    pub supported_models: Vec<String>,
    pub weight: f64,
    pub available: bool,
    pub health: HealthStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub metadata: RouteMetadata,
}

impl RouteInfo {
    /// Does this route support the requested model, directly or via glob?
    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.iter().any(|pattern| {
            Glob::new(pattern)
                .map(|g| g.compile_matcher().is_match(model))
                .unwrap_or(false)
        })
    }
}

/// Shared, concurrently-readable map of route id -> RouteInfo, replaced
/// wholesale on configuration reload (§5 "read-mostly" shared state).
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: DashMap<String, Arc<RouteInfo>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
        }
    }

    pub fn from_routes(routes: Vec<RouteInfo>) -> Self {
        let table = Self::new();
        for route in routes {
            table.routes.insert(route.id.clone(), Arc::new(route));
        }
        table
    }

    pub fn insert(&self, route: RouteInfo) {
        self.routes.insert(route.id.clone(), Arc::new(route));
    }

    pub fn remove(&self, id: &str) -> Option<Arc<RouteInfo>> {
        self.routes.remove(id).map(|(_, v)| v)
    }

    pub fn get(&self, id: &str) -> Option<Arc<RouteInfo>> {
        self.routes.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn all(&self) -> Vec<Arc<RouteInfo>> {
        self.routes.iter().map(|e| Arc::clone(e.value())).collect()
    }

    /// Candidate routes available for the given provider ids and model,
    /// preserving no particular order (caller scores and sorts).
    pub fn candidates_for(&self, provider_ids: &[String], model: &str) -> Vec<Arc<RouteInfo>> {
        self.routes
            .iter()
            .filter(|e| {
                let route = e.value();
                route.available
                    && provider_ids.contains(&route.provider_id)
                    && route.supports_model(model)
            })
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    pub fn replace_all(&self, routes: Vec<RouteInfo>) {
        self.routes.clear();
        for route in routes {
            self.routes.insert(route.id.clone(), Arc::new(route));
        }
    }
}
