//! Core Router: pure decision logic, no I/O, no transformation, no timers
//! (§4.1).

pub mod decision;
pub mod error;
pub mod route_info;
pub mod rules;

pub use decision::{pipeline_id, DecisionHistory, RoutingDecision};
pub use error::RoutingError;
pub use route_info::{HealthStatus, RouteInfo, RouteMetadata, RouteTable};
pub use rules::{Condition, ConditionValue, Operator, RoutingRule, RoutingRules};

use crate::config::EngineConfig;
use crate::model::RoutingRequest;
use chrono::Utc;
use std::sync::RwLock;
use std::time::Instant;

/// The Core Router. Rules and routes are read-mostly snapshots guarded by
/// a read-biased lock (§5); updates replace the whole snapshot
/// atomically so in-flight decisions keep using the version they started
/// with.
pub struct Router {
    rules: RwLock<std::sync::Arc<RoutingRules>>,
    routes: RouteTable,
    history: DecisionHistory,
}

impl Router {
    pub fn new(rules: RoutingRules, routes: RouteTable, history_capacity: usize) -> Self {
        Self {
            rules: RwLock::new(std::sync::Arc::new(rules)),
            routes,
            history: DecisionHistory::new(history_capacity),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn history(&self) -> &DecisionHistory {
        &self.history
    }

    /// `Route(req) -> (Decision, error)`.
    pub fn route(&self, request: &RoutingRequest) -> Result<RoutingDecision, RoutingError> {
        let started = Instant::now();
        let rules = std::sync::Arc::clone(&self.rules.read().expect("rules lock poisoned"));

        let (rule, rule_score) = rules.best_match(request).ok_or_else(|| {
            RoutingError::RoutingRuleNotFound(format!(
                "no enabled rule matched model='{}' category={:?}",
                request.model, request.category
            ))
        })?;

        let provider_candidates: Vec<_> = self
            .routes
            .all()
            .into_iter()
            .filter(|r| r.available && rule.target_providers.contains(&r.provider_id))
            .collect();

        if provider_candidates.is_empty() {
            return Err(RoutingError::ProviderUnavailable(format!(
                "no available route among providers {:?}",
                rule.target_providers
            )));
        }

        let mut model_candidates: Vec<_> = provider_candidates
            .into_iter()
            .filter(|r| r.supports_model(&request.model))
            .collect();

        if model_candidates.is_empty() {
            return Err(RoutingError::ModelUnavailable(format!(
                "no candidate route supports model '{}'",
                request.model
            )));
        }

        // Score: weight*100 + health bonus, scaled by the rule's
        // per-provider weight override (default 1.0). Ties broken
        // deterministically by route id, which §4.1 explicitly
        // allows in place of weighted-random selection.
        let score_of = |route: &RouteInfo| -> f64 {
            let provider_weight = rule
                .weights
                .as_ref()
                .and_then(|w| w.get(&route.provider_id))
                .copied()
                .unwrap_or(1.0);
            (route.weight * 100.0 + route.health.selection_bonus()) * provider_weight
        };

        model_candidates.sort_by(|a, b| {
            score_of(b)
                .partial_cmp(&score_of(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let selected = &model_candidates[0];
        let confidence = ((rule_score as f64) * selected.health.confidence_factor())
            .round()
            .clamp(0.0, 100.0) as u8;

        // Siblings are carried as route ids: the Execution Manager resolves
        // each back to a RouteInfo via the RouteTable and derives its own
        // pipeline id (provider + model + key index) for health/blacklist
        // bookkeeping.
        let siblings: Vec<String> = model_candidates[1..].iter().map(|r| r.id.clone()).collect();

        let decision = RoutingDecision {
            request_id: request.request_id.clone(),
            selected_provider_id: selected.provider_id.clone(),
            selected_model: request.model.clone(),
            selected_route_id: selected.id.clone(),
            reasoning: format!(
                "rule '{}' matched with score {} -> route '{}' ({:?})",
                rule.id, rule_score, selected.id, selected.health
            ),
            confidence,
            estimated_latency_ms: selected.health.estimated_latency_ms(),
            decision_timestamp: Utc::now(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            sibling_pipeline_ids: siblings,
        };

        self.history.push(decision.clone());
        Ok(decision)
    }

    /// `UpdateRules(rules)`: atomically replaces the rule set after
    /// validation. Old in-flight decisions keep the `Arc` they already
    /// cloned, so they finish against the previous snapshot.
    pub fn update_rules(&self, rules: RoutingRules) -> Result<(), RoutingError> {
        rules
            .validate()
            .map_err(RoutingError::RoutingRuleNotFound)?;
        *self.rules.write().expect("rules lock poisoned") = std::sync::Arc::new(rules);
        Ok(())
    }

    /// `UpdateRoutes(routes)`: entries failing validation are skipped, not
    /// fatal to the whole update.
    pub fn update_routes(&self, routes: Vec<RouteInfo>) {
        let valid: Vec<RouteInfo> = routes
            .into_iter()
            .filter(|r| {
                let ok = !r.id.is_empty()
                    && !r.provider_id.is_empty()
                    && !r.metadata.endpoint_url.is_empty();
                if !ok {
                    tracing::warn!(route_id = %r.id, "skipping invalid route in UpdateRoutes");
                }
                ok
            })
            .collect();
        self.routes.replace_all(valid);
    }

    /// `ValidateConfig(config) -> Result`: bridges to the configuration
    /// snapshot's own validation, which already enumerates disabled
    /// zero-fallback, missing default rule, and non-positive concurrency
    /// limits (§6.3 / §8 invariant 1).
    pub fn validate_config(config: &EngineConfig) -> Result<(), crate::config::ConfigError> {
        config.validate()
    }
}
