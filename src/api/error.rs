//! Caller-protocol-shaped error bodies (§4.5 "error passthrough",
//! §6.1). The same `EngineError` renders as an Anthropic envelope or an
//! OpenAI envelope depending on which endpoint raised it.

use crate::error::EngineError;
use crate::model::request::WireFormat;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Wraps an `EngineError` with the wire format its response must be
/// shaped for, so `IntoResponse` can pick the right envelope.
pub struct ApiError {
    pub inner: EngineError,
    pub format: WireFormat,
}

impl ApiError {
    pub fn new(inner: EngineError, format: WireFormat) -> Self {
        Self { inner, format }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match self.format {
            WireFormat::Anthropic => json!({
                "type": "error",
                "error": {
                    "type": self.inner.kind(),
                    "message": self.inner.message(),
                }
            }),
            WireFormat::OpenAi => json!({
                "error": {
                    "message": self.inner.message(),
                    "type": self.inner.kind(),
                    "code": self.inner.status_code(),
                }
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// A malformed request body, caught before routing even begins — always
/// the flat `{error, message}` shape §6.1 requires independent of
/// caller protocol.
pub struct ValidationErrorResponse {
    pub message: String,
}

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "validation_error", "message": self.message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_error_envelope_has_type_and_error_fields() {
        let err = ApiError::new(
            EngineError::ValidationError("model is required".to_string()),
            WireFormat::Anthropic,
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn openai_error_envelope_maps_provider_failure_to_500() {
        let err = ApiError::new(
            EngineError::ProviderFailure {
                message: "boom".to_string(),
                origin_was_request_shape: false,
            },
            WireFormat::OpenAi,
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
