//! ResponseTransformer layer (§4.5): converts a successful provider
//! response back to the caller's protocol. Error responses are not routed
//! through here — they are forwarded unchanged by the execution manager.

use super::WireResponse;
use crate::error::EngineError;
use crate::model::request::WireFormat;
use crate::provider::anthropic;

pub fn transform(
    provider_response: WireResponse,
    caller_format: WireFormat,
    request_id: &str,
) -> Result<WireResponse, EngineError> {
    let converted = match (provider_response, caller_format) {
        (WireResponse::OpenAi(resp), WireFormat::Anthropic) => WireResponse::Anthropic(
            anthropic::openai_response_to_anthropic(&resp, request_id),
        ),
        (WireResponse::OpenAi(resp), WireFormat::OpenAi) => WireResponse::OpenAi(resp),
        (WireResponse::Anthropic(resp), WireFormat::OpenAi) => {
            WireResponse::OpenAi(anthropic::anthropic_response_to_openai(&resp))
        }
        (WireResponse::Anthropic(resp), WireFormat::Anthropic) => WireResponse::Anthropic(resp),
    };

    match &converted {
        WireResponse::Anthropic(r) if !r.is_valid_shape() => {
            Err(EngineError::ProviderFailure {
                message: "response transformer produced a malformed anthropic envelope"
                    .to_string(),
                origin_was_request_shape: false,
            })
        }
        WireResponse::OpenAi(r) if r.choices.is_empty() => Err(EngineError::ProviderFailure {
            message: "response transformer produced zero choices".to_string(),
            origin_was_request_shape: false,
        }),
        _ => Ok(converted),
    }
}
