//! `GET /status`, `GET /health` — operational status (§6.1).

use super::AppState;
use crate::metrics::{HealthCheck, HealthSummary, StatusResponse};
use axum::extract::State;
use axum::Json;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(build_status(&state))
}

pub async fn handle_health(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(build_status(&state))
}

fn build_status(state: &AppState) -> StatusResponse {
    let checks: Vec<HealthCheck> = state
        .providers
        .keys()
        .map(|provider_id| {
            let destroyed = state
                .execution
                .blacklist()
                .destroyed_ids()
                .iter()
                .any(|pid| pid.starts_with(&format!("{provider_id}-")));
            HealthCheck {
                name: provider_id.clone(),
                status: if destroyed { "unhealthy" } else { "healthy" }.to_string(),
            }
        })
        .collect();

    let unhealthy_count = checks.iter().filter(|c| c.status == "unhealthy").count();
    let overall = if state.providers.is_empty() {
        "unhealthy"
    } else if unhealthy_count == 0 {
        "healthy"
    } else if unhealthy_count < state.providers.len() {
        "degraded"
    } else {
        "unhealthy"
    };

    StatusResponse {
        is_running: true,
        port: state.config.server.port,
        uptime: state.metrics.uptime_seconds(),
        version: VERSION.to_string(),
        total_requests: state.metrics.total_requests(),
        active_pipelines: state.router.routes().all().len(),
        health: HealthSummary {
            status: overall.to_string(),
            checks,
        },
    }
}
