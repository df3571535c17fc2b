//! `router.<category>` / `router.default` route expressions, per §6.3.
//!
//! Each value is an ordered sibling list expressed as
//! `"provider,model;provider,model;..."`. `"default"` is a reserved key in
//! the same table, not a separate section, matching the TOML shape of a
//! single `[router]` table with arbitrary keys.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RouterConfig(pub HashMap<String, String>);

impl RouterConfig {
    pub fn default_expression(&self) -> Option<&str> {
        self.0.get("default").map(|s| s.as_str())
    }

    pub fn category_expression(&self, category: &str) -> Option<&str> {
        self.0.get(category).map(|s| s.as_str())
    }

    /// Parse a route expression into an ordered list of (provider, model) pairs.
    pub fn parse_expression(expr: &str) -> Vec<(String, String)> {
        expr.split(';')
            .filter(|s| !s.trim().is_empty())
            .filter_map(|entry| {
                let mut parts = entry.splitn(2, ',');
                let provider = parts.next()?.trim();
                let model = parts.next()?.trim();
                if provider.is_empty() || model.is_empty() {
                    None
                } else {
                    Some((provider.to_string(), model.to_string()))
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroFallbackPolicyConfig {
    pub enabled: bool,
    pub strict_mode: bool,
    pub max_retries: Option<u32>,
}

impl Default for ZeroFallbackPolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_mode: false,
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RoutingSectionConfig {
    pub zero_fallback_policy: ZeroFallbackPolicyConfig,
}
