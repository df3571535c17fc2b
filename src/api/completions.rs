//! `POST /v1/chat/completions` — OpenAI-shaped chat endpoint (§6.1).

use super::error::{ApiError, ValidationErrorResponse};
use super::AppState;
use crate::execution::ExecutionInputs;
use crate::logging::generate_request_id;
use crate::model::request::{RoutingRequest, WireFormat};
use crate::pipeline::WireRequest;
use crate::provider::openai::OpenAiChatRequest;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use std::time::Instant;

pub async fn handle_completions(State(state): State<AppState>, body: Bytes) -> Response {
    let started = Instant::now();
    let request: OpenAiChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            state.metrics.record_inbound_request(400);
            return ValidationErrorResponse {
                message: format!("invalid request body: {e}"),
            }
            .into_response();
        }
    };

    if !request.is_valid_target_shape() {
        state.metrics.record_inbound_request(400);
        return ValidationErrorResponse {
            message: "model and a non-empty messages[] are required".to_string(),
        }
        .into_response();
    }

    let response = handle(&state, request).await;
    let status = match &response {
        Ok(_) => 200,
        Err(e) => e.inner.status_code(),
    };
    state.metrics.record_inbound_request(status);
    state
        .metrics
        .record_request_duration(started.elapsed().as_secs_f64());

    match response {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn handle(
    state: &AppState,
    request: OpenAiChatRequest,
) -> Result<serde_json::Value, ApiError> {
    let model = request.model.clone();
    let wrap = |e: crate::error::EngineError| ApiError::new(e, WireFormat::OpenAi);

    let routing_request = RoutingRequest::new(generate_request_id(), model)
        .map_err(|m| wrap(crate::error::EngineError::ValidationError(m)))?;

    let decision = state
        .router
        .route(&routing_request)
        .map_err(|e| wrap(e.into()))?;

    let origin = WireRequest::OpenAi(request);
    let result = state
        .execution
        .execute(ExecutionInputs {
            decision: &decision,
            route_table: state.router.routes(),
            providers: &state.providers,
            origin_request: &origin,
            origin_format: WireFormat::OpenAi,
            caller_format: WireFormat::OpenAi,
        })
        .await;

    match result.response {
        Some(wire) => serde_json::to_value(wire)
            .map_err(|e| wrap(crate::error::EngineError::ProviderFailure {
                message: format!("failed to serialize caller response: {e}"),
                origin_was_request_shape: false,
            })),
        None => Err(wrap(result.error.unwrap_or_else(|| {
            crate::error::EngineError::ProviderUnavailable(
                "no pipeline produced a successful response".to_string(),
            )
        }))),
    }
}
