//! The six-layer pipeline: Router -> Transformer -> Protocol ->
//! ServerCompatibility -> Server (HTTP) -> ResponseTransformer (§2,
//! §4.2-§4.5). The Router and Server/HTTP layers live in `router` and
//! `server`/`execution`; this module owns the format-conversion layers
//! that run once per execution attempt, since each sibling pipeline may
//! target a different provider and model.

pub mod compat;
pub mod protocol;
pub mod response;
pub mod transformer;

use crate::config::ProviderConfig;
use crate::error::EngineError;
use crate::model::request::WireFormat;
use crate::provider::anthropic::{AnthropicMessagesRequest, AnthropicMessagesResponse};
use crate::provider::openai::{OpenAiChatRequest, OpenAiChatResponse};
use crate::router::RouteInfo;
use serde::{Deserialize, Serialize};

/// A request body in one of the two wire shapes this engine understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireRequest {
    Anthropic(AnthropicMessagesRequest),
    OpenAi(OpenAiChatRequest),
}

impl WireRequest {
    pub fn is_valid_target_shape(&self) -> bool {
        match self {
            WireRequest::Anthropic(r) => r.is_valid_target_shape(),
            WireRequest::OpenAi(r) => r.is_valid_target_shape(),
        }
    }
}

/// A response body in one of the two wire shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireResponse {
    Anthropic(AnthropicMessagesResponse),
    OpenAi(OpenAiChatResponse),
}

/// Per-request, per-attempt side channel (§4.3): endpoint, credentials,
/// and headers, attached without ever mutating the wire body.
#[derive(Debug, Clone)]
pub struct ModuleProcessingContext {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub custom_headers: std::collections::HashMap<String, String>,
}

/// Runs the Transformer -> Protocol -> ServerCompatibility layers for one
/// execution attempt against `route`, checking the inter-layer shape
/// invariant (§3.2) after each stage.
pub fn build_outbound_request(
    origin: &WireRequest,
    origin_format: WireFormat,
    route: &RouteInfo,
    provider: &ProviderConfig,
    target_model: &str,
) -> Result<(ModuleProcessingContext, WireRequest), EngineError> {
    let target_flavor = crate::provider::ProtocolFlavor::from_provider_type(&route.provider_type);

    let transformed = transformer::transform(origin, origin_format, target_flavor, target_model)?;
    if !transformed.is_valid_target_shape() {
        return Err(EngineError::ProviderFailure {
            message: "transformer produced an empty or invalid target-shape body".to_string(),
            origin_was_request_shape: false,
        });
    }

    let ctx = protocol::build_context(route, provider, target_flavor)?;

    let compatible = compat::apply(transformed, provider);
    if !compatible.is_valid_target_shape() {
        return Err(EngineError::ProviderFailure {
            message: "server-compatibility layer produced an invalid target-shape body"
                .to_string(),
            origin_was_request_shape: false,
        });
    }

    Ok((ctx, compatible))
}

/// Runs the ResponseTransformer layer, converting a provider's response
/// back to the caller's protocol (§4.5).
pub fn build_caller_response(
    provider_response: WireResponse,
    caller_format: WireFormat,
    request_id: &str,
) -> Result<WireResponse, EngineError> {
    response::transform(provider_response, caller_format, request_id)
}
