//! Configuration: a read-only snapshot delivered to the engine (§6.3).
//!
//! The file watcher, secrets manager, and hot-reload loop are external
//! collaborators — this module only loads, validates, and hands back an
//! immutable snapshot. `Router::update_rules` / `update_routes` exist so a
//! future watcher can push a new snapshot in, matching §4.1's `UpdateRules`
//! / `UpdateRoutes` contract.

pub mod blacklist;
pub mod debug;
pub mod error;
pub mod logging;
pub mod performance;
pub mod providers;
pub mod router;
pub mod server;

pub use blacklist::{BlacklistSettingsConfig, DestroyRuleConfig, RateLimitRuleConfig};
pub use debug::DebugConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use performance::PerformanceConfig;
pub use providers::{ApiKeyConfig, ProviderConfig};
pub use router::{RouterConfig, RoutingSectionConfig, ZeroFallbackPolicyConfig};
pub use server::ServerConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration struct. Every sub-struct is `#[serde(default)]` so a
/// partial TOML file is always accepted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub providers: Vec<ProviderConfig>,
    pub router: RouterConfig,
    pub routing: RoutingSectionConfig,
    pub performance: PerformanceConfig,
    pub blacklist_settings: BlacklistSettingsConfig,
    pub debug: DebugConfig,
}

impl EngineConfig {
    /// Load configuration from a TOML file. `None` returns defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `LINKRELAY_*` environment variable overrides. Invalid values
    /// are silently ignored, keeping whatever default or file value was set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("LINKRELAY_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("LINKRELAY_HOST") {
            self.server.host = host;
        }
        if let Ok(level) = std::env::var("LINKRELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LINKRELAY_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        self
    }

    /// Validate the snapshot, per §4.1 `ValidateConfig` and invariant 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.routing.zero_fallback_policy.enabled {
            return Err(ConfigError::Validation {
                field: "routing.zero_fallback_policy.enabled".to_string(),
                message: "zero-fallback policy must be enabled".to_string(),
            });
        }

        match self.router.default_expression() {
            None => {
                return Err(ConfigError::MissingField("router.default".to_string()));
            }
            Some(expr) if router::RouterConfig::parse_expression(expr).is_empty() => {
                return Err(ConfigError::Validation {
                    field: "router.default".to_string(),
                    message: "default route expression must name at least one pipeline"
                        .to_string(),
                });
            }
            Some(_) => {}
        }

        if self.performance.max_concurrent_decisions == 0 {
            return Err(ConfigError::Validation {
                field: "performance.max_concurrent_decisions".to_string(),
                message: "must be non-zero".to_string(),
            });
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        for provider in &self.providers {
            provider
                .validate()
                .map_err(|message| ConfigError::Validation {
                    field: format!("providers[{}]", provider.name),
                    message,
                })?;
        }

        Ok(())
    }
}
