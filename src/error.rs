//! Top-level error taxonomy for the routing and execution engine.
//!
//! Every failure that can be surfaced to a caller belongs to exactly one of
//! these variants. Internal layers (`router`, `pipeline`, `server`,
//! `execution`) raise their own narrow `thiserror` enums and convert into
//! this one at the orchestrator boundary; nothing downstream of the API
//! layer should ever see a layer-private error type.

use thiserror::Error;

/// A single engine-wide error kind, one per taxonomy entry.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("no routing rule matched: {0}")]
    RoutingRuleNotFound(String),

    #[error("no healthy pipeline available: {0}")]
    ProviderUnavailable(String),

    #[error("model unavailable on selected pipeline: {0}")]
    ModelUnavailable(String),

    #[error("invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("provider timed out: {0}")]
    ProviderTimeout(String),

    #[error("provider failure: {message}")]
    ProviderFailure {
        message: String,
        /// true when the failure originates from the caller's request shape
        /// rather than the upstream provider (maps to 400 instead of 500).
        origin_was_request_shape: bool,
    },

    #[error("network error: {0}")]
    NetworkError(String),
}

impl EngineError {
    /// HTTP status this error kind maps to, per the taxonomy table.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::ValidationError(_) => 400,
            EngineError::RoutingRuleNotFound(_) => 400,
            EngineError::ProviderUnavailable(_) => 503,
            EngineError::ModelUnavailable(_) => 503,
            EngineError::ConfigurationError(_) => 400,
            EngineError::AuthenticationFailure(_) => 401,
            EngineError::RateLimited { .. } => 429,
            EngineError::ProviderTimeout(_) => 408,
            EngineError::ProviderFailure {
                origin_was_request_shape,
                ..
            } => {
                if *origin_was_request_shape {
                    400
                } else {
                    500
                }
            }
            EngineError::NetworkError(_) => 500,
        }
    }

    /// Short machine-readable kind name, used in error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ValidationError(_) => "validation_error",
            EngineError::RoutingRuleNotFound(_) => "routing_rule_not_found",
            EngineError::ProviderUnavailable(_) => "provider_unavailable",
            EngineError::ModelUnavailable(_) => "model_unavailable",
            EngineError::ConfigurationError(_) => "configuration_error",
            EngineError::AuthenticationFailure(_) => "authentication_failure",
            EngineError::RateLimited { .. } => "rate_limited",
            EngineError::ProviderTimeout(_) => "provider_timeout",
            EngineError::ProviderFailure { .. } => "provider_failure",
            EngineError::NetworkError(_) => "network_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            EngineError::ValidationError(m)
            | EngineError::RoutingRuleNotFound(m)
            | EngineError::ProviderUnavailable(m)
            | EngineError::ModelUnavailable(m)
            | EngineError::ConfigurationError(m)
            | EngineError::AuthenticationFailure(m)
            | EngineError::ProviderTimeout(m)
            | EngineError::NetworkError(m) => m.clone(),
            EngineError::RateLimited { message, .. } => message.clone(),
            EngineError::ProviderFailure { message, .. } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            EngineError::ValidationError("x".into()).status_code(),
            400
        );
        assert_eq!(
            EngineError::ProviderUnavailable("x".into()).status_code(),
            503
        );
        assert_eq!(
            EngineError::ModelUnavailable("x".into()).status_code(),
            503
        );
        assert_eq!(
            EngineError::AuthenticationFailure("x".into()).status_code(),
            401
        );
        assert_eq!(
            EngineError::RateLimited {
                message: "x".into(),
                retry_after_secs: Some(60)
            }
            .status_code(),
            429
        );
        assert_eq!(
            EngineError::ProviderTimeout("x".into()).status_code(),
            408
        );
        assert_eq!(
            EngineError::NetworkError("x".into()).status_code(),
            500
        );
    }

    #[test]
    fn provider_failure_status_depends_on_origin() {
        let server_side = EngineError::ProviderFailure {
            message: "boom".into(),
            origin_was_request_shape: false,
        };
        let request_side = EngineError::ProviderFailure {
            message: "boom".into(),
            origin_was_request_shape: true,
        };
        assert_eq!(server_side.status_code(), 500);
        assert_eq!(request_side.status_code(), 400);
    }
}
