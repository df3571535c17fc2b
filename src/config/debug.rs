//! `debug.*`, per §6.3. The engine only emits the hook described in
//! §9 "debug recording to disk"; it never writes files itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}
