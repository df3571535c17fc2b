//! HTTP API Gateway (§6.1): the orchestrator's inbound surface.
//!
//! Exposes the Anthropic-shaped `/v1/messages` endpoint, the OpenAI-shaped
//! `/v1/chat/completions` endpoint, and `/status` / `/health` / `/metrics`
//! for operational visibility. Every handler shares an [`AppState`] snapshot
//! built once at startup by [`crate::cli::serve`].

pub mod completions;
pub mod error;
pub mod messages;
pub mod status;

use crate::config::{EngineConfig, ProviderConfig};
use crate::execution::ExecutionManager;
use crate::metrics::MetricsCollector;
use crate::router::Router;
use axum::routing::{get, post};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Body size cap per §6.1: 10 MiB, 413 on overflow.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Shared, cheaply-cloned application state handed to every handler via
/// axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngineConfig>,
    pub router: Arc<Router>,
    pub execution: Arc<ExecutionManager>,
    pub providers: Arc<HashMap<String, ProviderConfig>>,
    pub metrics: Arc<MetricsCollector>,
}

/// Wire up every inbound endpoint over a shared `AppState`.
pub fn create_router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/v1/messages", post(messages::handle_messages))
        .route("/v1/chat/completions", post(completions::handle_completions))
        .route("/status", get(status::handle_status))
        .route("/health", get(status::handle_health))
        .route("/metrics", get(crate::metrics::handler::metrics_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
