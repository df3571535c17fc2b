//! Provider definitions, per §6.3 `providers[]`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `apiKey` may be configured as a single string or a list (multi-key
/// rotation is left to the configuration loader's remit per §4.3 —
/// this engine only ever picks the first).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiKeyConfig {
    Single(String),
    Multiple(Vec<String>),
}

impl ApiKeyConfig {
    pub fn first(&self) -> Option<&str> {
        match self {
            ApiKeyConfig::Single(s) if !s.is_empty() => Some(s.as_str()),
            ApiKeyConfig::Single(_) => None,
            ApiKeyConfig::Multiple(v) => v.first().map(|s| s.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: String,
    pub api_key: ApiKeyConfig,
    #[serde(default)]
    pub custom_headers: Option<HashMap<String, String>>,
    pub models: Vec<String>,
    /// `openai-compatible` or `anthropic-native`, per §3.1's RouteInfo.
    #[serde(default = "default_provider_type")]
    pub provider_type: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider_type() -> String {
    "openai-compatible".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("provider name must not be empty".to_string());
        }
        if self.endpoint.is_empty() {
            return Err(format!("provider '{}' endpoint must not be empty", self.name));
        }
        if self.models.is_empty() {
            return Err(format!(
                "provider '{}' must declare at least one model",
                self.name
            ));
        }
        if self.api_key.first().is_none() {
            return Err(format!("provider '{}' has no usable api key", self.name));
        }
        Ok(())
    }
}
