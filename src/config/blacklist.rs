//! `blacklistSettings.*`, per §6.3.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyRuleConfig {
    pub status_code: u16,
    #[serde(default)]
    pub error_patterns: Vec<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitRuleConfig {
    pub block_duration_secs: u64,
    pub max_consecutive_failures: u32,
    pub reset_interval_secs: u64,
}

impl Default for RateLimitRuleConfig {
    fn default() -> Self {
        Self {
            block_duration_secs: 60,
            max_consecutive_failures: 3,
            reset_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistSettingsConfig {
    pub destroy_rules: Vec<DestroyRuleConfig>,
    pub rate_limit_rule: RateLimitRuleConfig,
    pub persistence_file: PathBuf,
    pub max_blacklist_duration_secs: u64,
}

impl Default for BlacklistSettingsConfig {
    fn default() -> Self {
        Self {
            destroy_rules: Vec::new(),
            rate_limit_rule: RateLimitRuleConfig::default(),
            persistence_file: PathBuf::from("blacklist_state.json"),
            max_blacklist_duration_secs: 300,
        }
    }
}
