//! Transformer layer (§4.2): converts the caller's request body to
//! the target provider's wire format.

use super::WireRequest;
use crate::error::EngineError;
use crate::model::request::WireFormat;
use crate::provider::{anthropic, ProtocolFlavor};

pub fn transform(
    origin: &WireRequest,
    origin_format: WireFormat,
    target_flavor: ProtocolFlavor,
    target_model: &str,
) -> Result<WireRequest, EngineError> {
    match (origin, origin_format, target_flavor) {
        (WireRequest::Anthropic(req), _, ProtocolFlavor::OpenAiCompatible) => Ok(
            WireRequest::OpenAi(anthropic::anthropic_request_to_openai(req, target_model)),
        ),
        (WireRequest::Anthropic(req), _, ProtocolFlavor::AnthropicNative) => {
            let mut req = req.clone();
            req.model = target_model.to_string();
            Ok(WireRequest::Anthropic(req))
        }
        (WireRequest::OpenAi(req), _, ProtocolFlavor::AnthropicNative) => Ok(
            WireRequest::Anthropic(anthropic::openai_request_to_anthropic(req, target_model)),
        ),
        (WireRequest::OpenAi(req), _, ProtocolFlavor::OpenAiCompatible) => {
            let mut req = req.clone();
            req.model = target_model.to_string();
            Ok(WireRequest::OpenAi(req))
        }
    }
}
