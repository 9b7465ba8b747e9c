// compliance.rs — Compliance items and preventive-maintenance schedules.
//
// Compliance items are externally imposed deadlines (inspections, filings,
// certifications). PM schedules are recurring internal maintenance; the
// compliance workflow audits both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::work_order::WorkOrderCategory;

/// Regulatory category of a compliance item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceCategory {
    FireSafety,
    Elevator,
    Boiler,
    Facade,
    LeadPaint,
    General,
}

impl ComplianceCategory {
    /// Map a compliance category to the work-order trade category used when
    /// remediation work is created.
    pub fn work_order_category(&self) -> WorkOrderCategory {
        match self {
            ComplianceCategory::FireSafety => WorkOrderCategory::FireSafety,
            ComplianceCategory::Elevator => WorkOrderCategory::Elevator,
            ComplianceCategory::Boiler => WorkOrderCategory::Hvac,
            ComplianceCategory::Facade => WorkOrderCategory::Roofing,
            ComplianceCategory::LeadPaint => WorkOrderCategory::General,
            ComplianceCategory::General => WorkOrderCategory::General,
        }
    }
}

/// Lifecycle status of a compliance item. Only Pending and Overdue items are
/// scanned; the workflow flips items to InProgress when remediation work is
/// created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Pending,
    Overdue,
    InProgress,
    Resolved,
}

/// An externally imposed compliance deadline at a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceItem {
    pub id: Uuid,
    pub property_id: Uuid,
    pub title: String,
    pub category: ComplianceCategory,
    pub status: ComplianceStatus,
    pub due_at: DateTime<Utc>,
}

/// A recurring preventive-maintenance schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmSchedule {
    pub id: Uuid,
    pub property_id: Uuid,
    pub title: String,
    pub category: WorkOrderCategory,
    /// Recurrence interval in days.
    pub frequency_days: i64,
    /// Next due date. Advanced by `frequency_days` from the current due date
    /// (not from "now") each time work is generated, so the cadence never
    /// drifts when a run fires late.
    pub next_due_at: DateTime<Utc>,
    pub active: bool,
}
