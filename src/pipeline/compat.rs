//! ServerCompatibility layer (§4.4): per-provider quirks. Output must
//! still satisfy the target-protocol shape invariant, checked by the
//! caller (`pipeline::build_outbound_request`).

use super::WireRequest;
use crate::config::ProviderConfig;

/// Ceiling applied across providers for now; a future per-model ceiling
/// table would live in `ProviderConfig` once providers need it.
const MAX_TOKENS_CEILING: u32 = 8192;

pub fn apply(mut request: WireRequest, _provider: &ProviderConfig) -> WireRequest {
    match &mut request {
        WireRequest::OpenAi(req) => {
            req.stream = false;
            if let Some(max_tokens) = req.max_tokens {
                req.max_tokens = Some(max_tokens.min(MAX_TOKENS_CEILING));
            }
        }
        WireRequest::Anthropic(req) => {
            req.max_tokens = req.max_tokens.min(MAX_TOKENS_CEILING);
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::providers::ApiKeyConfig;
    use crate::provider::openai::{OpenAiChatRequest, OpenAiMessage};

    fn provider() -> ProviderConfig {
        ProviderConfig {
            name: "lmstudio".to_string(),
            endpoint: "http://localhost:1234/v1".to_string(),
            api_key: ApiKeyConfig::Single("sk-x".to_string()),
            custom_headers: None,
            models: vec!["m1".to_string()],
            provider_type: "openai-compatible".to_string(),
            timeout_secs: 120,
            max_retries: 3,
        }
    }

    #[test]
    fn clamps_excessive_max_tokens() {
        let req = WireRequest::OpenAi(OpenAiChatRequest {
            model: "m".to_string(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: Some("hi".to_string()),
                tool_calls: None,
                tool_call_id: None,
                name: None,
            }],
            max_tokens: Some(100_000),
            temperature: None,
            top_p: None,
            stop: None,
            tools: None,
            tool_choice: None,
            stream: true,
        });
        let out = apply(req, &provider());
        match out {
            WireRequest::OpenAi(r) => {
                assert_eq!(r.max_tokens, Some(MAX_TOKENS_CEILING));
                assert!(!r.stream);
            }
            _ => panic!("expected openai shape"),
        }
    }
}
