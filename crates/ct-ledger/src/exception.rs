// exception.rs — Exception: the human-facing escalation artifact.
//
// Not a language exception. An Exception is a work item for a person: the
// agent hit something it must not (or could not) handle alone. Created Open;
// acknowledgment and resolution happen in the platform UI, outside this core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How urgently a human needs to look.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What domain the escalation belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionCategory {
    Legal,
    Financial,
    Safety,
    Sla,
    System,
}

/// Human-side lifecycle. The core only ever creates Open exceptions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    Open,
    Acknowledged,
    Resolved,
}

/// A human-facing escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exception {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<Uuid>,
    pub severity: Severity,
    pub category: ExceptionCategory,
    pub title: String,
    pub detail: String,
    pub status: ExceptionStatus,

    /// Machine-prepared material for the human decision: a drafted reply,
    /// a suggested work order, a bid summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_payload: Option<Value>,

    /// Deadline by which a human should respond.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respond_by: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Exception {
    pub fn new(
        severity: Severity,
        category: ExceptionCategory,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id: None,
            property_id: None,
            severity,
            category,
            title: title.into(),
            detail: detail.into(),
            status: ExceptionStatus::Open,
            suggested_payload: None,
            respond_by: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the run that raised this exception (builder pattern).
    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_property(mut self, property_id: Uuid) -> Self {
        self.property_id = Some(property_id);
        self
    }

    pub fn with_suggested_payload(mut self, payload: Value) -> Self {
        self.suggested_payload = Some(payload);
        self
    }

    pub fn with_respond_by(mut self, deadline: DateTime<Utc>) -> Self {
        self.respond_by = Some(deadline);
        self
    }
}
