//! Blacklist Manager (§4.11): temporary blocks, the 429 rate-limit
//! ladder, configured destroy rules, and debounced JSON persistence.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub pipeline_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub block_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitCounter {
    pub pipeline_id: String,
    pub consecutive_count: u32,
    pub first_failure_time: DateTime<Utc>,
    pub last_failure_time: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistedState {
    pub timestamp: i64,
    #[serde(default)]
    pub rate_limit_counters: Vec<RateLimitCounter>,
    #[serde(default)]
    pub temporary_blocks: Vec<BlacklistEntry>,
}

#[derive(Debug, Clone)]
pub enum BlockAction {
    TemporaryBlock { duration: Duration },
    Destroy,
}

#[derive(Debug, Clone)]
pub struct DestroyRule {
    pub status_code: Option<u16>,
    pub error_patterns: Vec<String>,
    pub enabled: bool,
}

pub struct BlacklistSettings {
    pub rate_limit_block_duration: Duration,
    pub rate_limit_max_consecutive_failures: u32,
    pub rate_limit_reset_interval: Duration,
    pub max_blacklist_duration: Duration,
    pub destroy_rules: Vec<DestroyRule>,
}

impl Default for BlacklistSettings {
    fn default() -> Self {
        Self {
            rate_limit_block_duration: Duration::from_secs(60),
            rate_limit_max_consecutive_failures: 3,
            rate_limit_reset_interval: Duration::from_secs(300),
            max_blacklist_duration: Duration::from_secs(300),
            destroy_rules: Vec::new(),
        }
    }
}

/// Status as observed by the Execution Manager / Core Router.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStatus {
    Active,
    TemporarilyBlocked {
        until: DateTime<Utc>,
        reason: String,
        consecutive_failures: u32,
    },
}

enum Mutation {
    Write(PersistedState),
}

pub struct BlacklistManager {
    blocks: DashMap<String, BlacklistEntry>,
    rate_limits: DashMap<String, RateLimitCounter>,
    destroyed: DashMap<String, ()>,
    settings: BlacklistSettings,
    write_tx: Option<mpsc::Sender<Mutation>>,
}

impl BlacklistManager {
    pub fn new(settings: BlacklistSettings) -> Self {
        Self {
            blocks: DashMap::new(),
            rate_limits: DashMap::new(),
            destroyed: DashMap::new(),
            settings,
            write_tx: None,
        }
    }

    /// Spawns the single debounced persistence writer task (§5: "a
    /// single writer task consumes mutation events ... coalesces writes
    /// with a short debounce"). Returns the constructed manager wrapped for
    /// shared use.
    pub fn with_persistence(mut self, path: PathBuf, debounce: Duration) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<Mutation>(64);
        self.write_tx = Some(tx);
        let manager = Arc::new(self);
        tokio::spawn(async move {
            let mut pending: Option<PersistedState> = None;
            loop {
                tokio::select! {
                    maybe = rx.recv() => {
                        match maybe {
                            Some(Mutation::Write(state)) => pending = Some(state),
                            None => break,
                        }
                    }
                    _ = tokio::time::sleep(debounce), if pending.is_some() => {
                        if let Some(state) = pending.take() {
                            if let Err(e) = write_state(&path, &state).await {
                                tracing::warn!(error = %e, "failed to persist blacklist state");
                            }
                        }
                    }
                }
            }
        });
        manager
    }

    pub fn rehydrate(&self, state: PersistedState) {
        let now = Utc::now();
        for block in state.temporary_blocks {
            if block.expires_at > now {
                self.blocks.insert(block.pipeline_id.clone(), block);
            }
        }
        for counter in state.rate_limit_counters {
            if counter.reset_at > now {
                self.rate_limits.insert(counter.pipeline_id.clone(), counter);
            }
        }
    }

    pub fn status(&self, pipeline_id: &str) -> PipelineStatus {
        let active = self.blocks.get(pipeline_id).and_then(|entry| {
            if entry.expires_at > Utc::now() {
                Some(PipelineStatus::TemporarilyBlocked {
                    until: entry.expires_at,
                    reason: entry.reason.clone(),
                    consecutive_failures: entry.block_count,
                })
            } else {
                None
            }
        });
        match active {
            Some(status) => status,
            None => {
                self.blocks.remove(pipeline_id);
                PipelineStatus::Active
            }
        }
    }

    pub fn is_blacklisted(&self, pipeline_id: &str) -> bool {
        matches!(self.status(pipeline_id), PipelineStatus::TemporarilyBlocked { .. })
            || self.destroyed.contains_key(pipeline_id)
    }

    pub fn is_destroyed(&self, pipeline_id: &str) -> bool {
        self.destroyed.contains_key(pipeline_id)
    }

    /// `AddTemporaryBlock(id, duration, reason)`. Re-blocking multiplies
    /// `duration` by the repeat count, capped at `maxBlacklistDuration`.
    pub fn add_temporary_block(&self, pipeline_id: &str, duration: Duration, reason: &str) {
        let now = Utc::now();
        let block_count = self
            .blocks
            .get(pipeline_id)
            .map(|e| e.block_count + 1)
            .unwrap_or(1);
        let extended = duration
            .saturating_mul(block_count)
            .min(self.settings.max_blacklist_duration);
        let entry = BlacklistEntry {
            pipeline_id: pipeline_id.to_string(),
            reason: reason.to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(extended).unwrap_or_default(),
            block_count,
        };
        self.blocks.insert(pipeline_id.to_string(), entry);
        self.persist();
    }

    /// `Handle429(id) -> BlockAction`.
    pub fn handle_429(&self, pipeline_id: &str) -> BlockAction {
        let now = Utc::now();
        let mut counter = self
            .rate_limits
            .entry(pipeline_id.to_string())
            .or_insert_with(|| RateLimitCounter {
                pipeline_id: pipeline_id.to_string(),
                consecutive_count: 0,
                first_failure_time: now,
                last_failure_time: now,
                reset_at: now + chrono::Duration::from_std(self.settings.rate_limit_reset_interval).unwrap_or_default(),
            });

        if counter.reset_at < now {
            counter.consecutive_count = 0;
            counter.first_failure_time = now;
        }
        counter.consecutive_count += 1;
        counter.last_failure_time = now;
        counter.reset_at = now + chrono::Duration::from_std(self.settings.rate_limit_reset_interval).unwrap_or_default();

        let should_destroy = counter.consecutive_count >= self.settings.rate_limit_max_consecutive_failures;
        drop(counter);

        let action = if should_destroy {
            self.destroy(pipeline_id);
            BlockAction::Destroy
        } else {
            BlockAction::TemporaryBlock {
                duration: self.settings.rate_limit_block_duration,
            }
        };
        self.persist();
        action
    }

    /// `ResetRateLimit(id)`, called on the first success.
    pub fn reset_rate_limit(&self, pipeline_id: &str) {
        self.rate_limits.remove(pipeline_id);
        self.persist();
    }

    /// Destroy semantics: permanently drop for the process lifetime, clear
    /// all associated counters.
    pub fn destroy(&self, pipeline_id: &str) {
        self.destroyed.insert(pipeline_id.to_string(), ());
        self.blocks.remove(pipeline_id);
        self.rate_limits.remove(pipeline_id);
        self.persist();
    }

    pub fn should_destroy_pipeline(&self, status: u16, message: &str) -> bool {
        self.settings.destroy_rules.iter().any(|rule| {
            rule.enabled
                && rule.status_code.map(|c| c == status).unwrap_or(true)
                && (rule.error_patterns.is_empty()
                    || rule.error_patterns.iter().any(|p| message.contains(p.as_str())))
        })
    }

    pub fn manual_unblock(&self, pipeline_id: &str) {
        self.blocks.remove(pipeline_id);
        self.rate_limits.remove(pipeline_id);
        self.persist();
    }

    fn persist(&self) {
        let Some(tx) = &self.write_tx else { return };
        let state = PersistedState {
            timestamp: Utc::now().timestamp_millis(),
            rate_limit_counters: self.rate_limits.iter().map(|e| e.value().clone()).collect(),
            temporary_blocks: self.blocks.iter().map(|e| e.value().clone()).collect(),
        };
        let _ = tx.try_send(Mutation::Write(state));
    }

    pub fn destroyed_ids(&self) -> HashSet<String> {
        self.destroyed.iter().map(|e| e.key().clone()).collect()
    }
}

async fn write_state(path: &PathBuf, state: &PersistedState) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(state).unwrap_or_default();
    tokio::fs::write(path, json).await
}

pub async fn load_state(path: &PathBuf) -> PersistedState {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => PersistedState::default(),
    }
}
