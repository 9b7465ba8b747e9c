// property.rs — Properties, leases, and reported incidents.
//
// A Property is the ownership root: every authorization check in the action
// validator walks an entity back to its property and compares the property's
// manager against the acting manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A managed property. `manager_id` is the owning manager — the actor whose
/// scope every automated action is checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub manager_id: Uuid,
    pub name: String,
    pub address: String,
}

/// A tenant lease at a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: Uuid,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub ends_at: DateTime<Utc>,
    /// True once a renewal offer has been extended to the tenant.
    pub renewal_offer_pending: bool,
}

/// Severity of a reported incident.
///
/// Critical incidents (gas leak, flooding, fire) bypass the policy engine
/// entirely — they always escalate to a human.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A tenant- or staff-reported incident at a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub property_id: Uuid,
    pub severity: IncidentSeverity,
    pub category: crate::work_order::WorkOrderCategory,
    pub description: String,
    pub reported_at: DateTime<Utc>,
}
