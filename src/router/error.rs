//! Core Router error kinds, per §4.1 — `Route` returns exactly one of
//! these three and no other.

use crate::error::EngineError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RoutingError {
    #[error("no enabled rule matched the request: {0}")]
    RoutingRuleNotFound(String),

    #[error("all matching pipelines are unhealthy or blacklisted: {0}")]
    ProviderUnavailable(String),

    #[error("selected pipeline does not support the requested model: {0}")]
    ModelUnavailable(String),
}

impl From<RoutingError> for EngineError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::RoutingRuleNotFound(m) => EngineError::RoutingRuleNotFound(m),
            RoutingError::ProviderUnavailable(m) => EngineError::ProviderUnavailable(m),
            RoutingError::ModelUnavailable(m) => EngineError::ModelUnavailable(m),
        }
    }
}
