// step.rs — Step: an ordered, independently tracked unit of work in a Run.
//
//   Planned → Running → { Done | Failed }
//   Planned → Skipped
//
// Invariant (enforced by the RunRecorder): every step created during a run
// reaches a terminal status no later than the moment the run terminates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::LedgerError;

/// Lifecycle state of a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Planned,
    Running,
    Done,
    Failed,
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Planned => "planned",
            StepStatus::Running => "running",
            StepStatus::Done => "done",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Failed | StepStatus::Skipped)
    }

    pub fn can_transition_to(&self, next: &StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Planned, StepStatus::Running)
                | (StepStatus::Planned, StepStatus::Skipped)
                | (StepStatus::Running, StepStatus::Done)
                | (StepStatus::Running, StepStatus::Failed)
        )
    }
}

/// One unit of work inside a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub run_id: Uuid,
    /// 1-based position within the run. Steps execute strictly in order.
    pub step_order: u32,
    pub name: String,
    pub status: StepStatus,
    /// What the step was given.
    #[serde(default)]
    pub input: Value,
    /// What the step produced.
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Step {
    pub fn new(run_id: Uuid, step_order: u32, name: impl Into<String>, input: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            run_id,
            step_order,
            name: name.into(),
            status: StepStatus::Planned,
            input,
            output: Value::Null,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: StepStatus) -> Result<(), LedgerError> {
        if !self.status.can_transition_to(&next) {
            return Err(LedgerError::InvalidStepTransition {
                step_id: self.id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
