// run.rs — Run: one workflow execution for a single trigger.
//
// The state machine is strictly monotonic:
//
//   Queued → Running → { Completed | Escalated | Failed }
//
// with Failed also reachable directly from Queued (the trigger can turn out
// to be unloadable before any work starts). Exactly one terminal state is
// ever reached and terminal states have no outgoing transitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// What kind of event started a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// A preventive-maintenance schedule came due.
    PmDue,
    /// A new incident was reported.
    NewIncident,
    /// A work order sat unassigned past the grace window.
    UnassignedWorkOrder,
    /// A tenant sent a message.
    TenantMessage,
    /// The periodic compliance scan fired.
    ComplianceScan,
    /// A work order blew through its SLA deadline.
    SlaBreach,
    /// A manager started an agent session.
    AgentSession,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerType::PmDue => "pm_due",
            TriggerType::NewIncident => "new_incident",
            TriggerType::UnassignedWorkOrder => "unassigned_work_order",
            TriggerType::TenantMessage => "tenant_message",
            TriggerType::ComplianceScan => "compliance_scan",
            TriggerType::SlaBreach => "sla_breach",
            TriggerType::AgentSession => "agent_session",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created by the trigger dispatcher, not yet picked up.
    Queued,
    /// A workflow invocation owns it.
    Running,
    /// Finished; automated action was taken (or correctly not needed).
    Completed,
    /// Finished; a human now owns the outcome via one or more Exceptions.
    Escalated,
    /// Finished; something broke unexpectedly.
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Escalated => "escalated",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Escalated | RunStatus::Failed
        )
    }

    /// Check whether transitioning from this status to `next` is valid.
    pub fn can_transition_to(&self, next: &RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Queued, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Escalated)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

/// One workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub trigger_type: TriggerType,

    /// The dedupe key this run was created under. Unique across runs; the
    /// idempotency boundary for at-least-once trigger delivery.
    pub trigger_ref: String,

    /// The property this run concerns. Portfolio-wide runs (agent sessions)
    /// have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<Uuid>,

    pub status: RunStatus,

    /// One-line outcome, set at termination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Failure detail, set only when status is Failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Create a new run in Queued.
    pub fn new(
        trigger_type: TriggerType,
        trigger_ref: impl Into<String>,
        property_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trigger_type,
            trigger_ref: trigger_ref.into(),
            property_id,
            status: RunStatus::Queued,
            summary: None,
            error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    /// Transition to a new status, stamping started/finished times.
    pub fn transition(&mut self, next: RunStatus) -> Result<(), LedgerError> {
        if !self.status.can_transition_to(&next) {
            return Err(LedgerError::InvalidRunTransition {
                run_id: self.id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let now = Utc::now();
        if next == RunStatus::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
