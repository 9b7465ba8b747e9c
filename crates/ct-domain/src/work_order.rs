// work_order.rs — Work orders and vendor bids.
//
// A WorkOrder is the unit of physical work at a property: a repair, a
// preventive-maintenance task, or a compliance remediation. Bids are vendor
// quotes attached to a work order; accepting a bid commits spend and is
// therefore policy-gated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trade category of a work order. Drives vendor matching and the
/// auto-assign whitelist in policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderCategory {
    Plumbing,
    Electrical,
    Hvac,
    Appliance,
    Roofing,
    FireSafety,
    Elevator,
    General,
}

impl std::fmt::Display for WorkOrderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkOrderCategory::Plumbing => "plumbing",
            WorkOrderCategory::Electrical => "electrical",
            WorkOrderCategory::Hvac => "hvac",
            WorkOrderCategory::Appliance => "appliance",
            WorkOrderCategory::Roofing => "roofing",
            WorkOrderCategory::FireSafety => "fire_safety",
            WorkOrderCategory::Elevator => "elevator",
            WorkOrderCategory::General => "general",
        };
        write!(f, "{}", s)
    }
}

/// Urgency of a work order. Emergency work is never auto-assigned when the
/// policy escalates emergencies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderPriority {
    Low,
    Medium,
    High,
    Emergency,
}

/// Lifecycle status of a work order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    New,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    /// Terminal work orders accept no further automation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkOrderStatus::Completed | WorkOrderStatus::Cancelled)
    }
}

/// A unit of physical work at a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: Uuid,
    pub property_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: WorkOrderCategory,
    pub priority: WorkOrderPriority,
    pub status: WorkOrderStatus,

    /// Assigned vendor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_vendor_id: Option<Uuid>,

    /// The tenant who reported the underlying problem, when there is one.
    /// Used to notify them about reassignments and delays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,

    /// SLA deadline for resolution. None means no SLA applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_due_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    /// Create a new, unassigned work order.
    pub fn new(
        property_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        category: WorkOrderCategory,
        priority: WorkOrderPriority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            title: title.into(),
            description: description.into(),
            category,
            priority,
            status: WorkOrderStatus::New,
            assigned_vendor_id: None,
            tenant_id: None,
            sla_due_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of a vendor bid on a work order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    /// A bid was requested from the vendor but not yet returned.
    Pending,
    /// The vendor submitted a quote.
    Submitted,
    Accepted,
    Rejected,
}

/// A vendor quote for a work order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub work_order_id: Uuid,
    pub vendor_id: Uuid,
    /// Quoted amount in the platform currency. Zero while Pending.
    pub amount: f64,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
