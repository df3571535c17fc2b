//! Provider adapters: one per wire protocol flavor, dispatched from the
//! Transformer / Protocol / ResponseTransformer layers by provider type.

pub mod anthropic;
pub mod openai;

use serde::{Deserialize, Serialize};

/// Wire protocol a route's provider speaks, matching `RouteInfo.provider_type`
/// `provider type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolFlavor {
    OpenAiCompatible,
    AnthropicNative,
}

impl ProtocolFlavor {
    /// Canonical path appended when a configured endpoint ends in `/v1`
    /// with no specific API suffix (§4.3).
    pub fn canonical_path(&self) -> &'static str {
        match self {
            ProtocolFlavor::OpenAiCompatible => "/chat/completions",
            ProtocolFlavor::AnthropicNative => "/messages",
        }
    }

    pub fn from_provider_type(s: &str) -> Self {
        match s {
            "anthropic-native" => ProtocolFlavor::AnthropicNative,
            _ => ProtocolFlavor::OpenAiCompatible,
        }
    }
}
