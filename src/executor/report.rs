use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a run currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Validating,
    Transpiling,
    Executing,
    Completed,
    Failed,
}

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    /// Rejected by the denylist before transpiling
    ContentPolicy,
    Transpilation,
    Execution,
    Timeout,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// One entry per console call, in call order
    Completed { output: Vec<String> },
    Failed { kind: RunErrorKind, message: String },
}

impl RunOutcome {
    pub(crate) fn failed(kind: RunErrorKind, message: impl Into<String>) -> Self {
        RunOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn stopped() -> Self {
        Self::failed(RunErrorKind::Stopped, "execution stopped")
    }
}

/// Everything known about a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    /// Captured lines of a completed run
    pub fn output(&self) -> Option<&[String]> {
        match &self.outcome {
            RunOutcome::Completed { output } => Some(output),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<RunErrorKind> {
        match &self.outcome {
            RunOutcome::Completed { .. } => None,
            RunOutcome::Failed { kind, .. } => Some(*kind),
        }
    }

    pub fn final_phase(&self) -> RunPhase {
        if self.is_success() {
            RunPhase::Completed
        } else {
            RunPhase::Failed
        }
    }
}
