//! `performance.*`, per §6.3 and §5.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub max_concurrent_decisions: u32,
    pub decision_timeout_ms: u64,
    pub history_retention: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_decisions: 100,
            decision_timeout_ms: 30_000,
            history_retention: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = PerformanceConfig::default();
        assert_eq!(cfg.max_concurrent_decisions, 100);
        assert_eq!(cfg.decision_timeout_ms, 30_000);
        assert_eq!(cfg.history_retention, 200);
    }
}
