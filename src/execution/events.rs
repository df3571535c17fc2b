//! Event hooks (§6.5): push-only, best-effort. A slow subscriber must
//! never block request processing, so the bus is a bounded channel where
//! the newest event drops the oldest on overflow rather than backpressuring
//! the publisher.

use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "name", content = "payload", rename_all = "kebab-case")]
pub enum EngineEvent {
    PipelineDestroy { pipeline_id: String, reason: String },
    PipelineTemporaryBlock { pipeline_id: String, reason: String, until_ms: i64 },
    PipelineManualUnblock { pipeline_id: String },
    FallbackBlocked { request_id: String, attempted: Vec<String> },
    ProviderExecutionSuccess { pipeline_id: String, latency_ms: u64 },
    ProviderExecutionFailure { pipeline_id: String, reason: String },
}

/// Thin wrapper over `tokio::sync::broadcast`, which already implements
/// drop-oldest-on-overflow semantics for lagging receivers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _rx) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Never blocks and never panics on a full or subscriber-less bus.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
