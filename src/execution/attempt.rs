//! `ErrorAction`, `ExecutionAttempt`, `ExecutionResult` — per §3.1.

use crate::error::EngineError;
use crate::pipeline::WireResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The Error Classifier's verdict for one failed attempt against one
/// pipeline (§4.9).
#[derive(Debug, Clone)]
pub enum ErrorAction {
    BlacklistPipeline { duration: Duration, reason: String },
    SkipPipeline { reason: String },
    RetrySamePipeline { retry_after: Duration, reason: String },
    FatalError { reason: String },
}

impl ErrorAction {
    pub fn reason(&self) -> &str {
        match self {
            ErrorAction::BlacklistPipeline { reason, .. } => reason,
            ErrorAction::SkipPipeline { reason } => reason,
            ErrorAction::RetrySamePipeline { reason, .. } => reason,
            ErrorAction::FatalError { reason } => reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub pipeline_id: String,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    /// Present on failure; `None` on success.
    pub error_message: Option<String>,
    /// Human-readable description of the `ErrorAction` taken, if any.
    pub action_taken: Option<String>,
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Success,
    Failed,
    NoPipelinesAvailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub succeeded_pipeline_id: Option<String>,
    pub attempts: Vec<ExecutionAttempt>,
    pub total_time_ms: u64,
    pub final_status: FinalStatus,
    /// The caller-shaped body on success, already translated by the
    /// ResponseTransformer layer. `None` on any non-success outcome.
    #[serde(skip)]
    pub response: Option<WireResponse>,
    #[serde(skip)]
    pub error: Option<EngineError>,
}
