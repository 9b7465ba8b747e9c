// vendor.rs — Vendors and vendor-property links.
//
// Vendors are ranked by performance score when the maintenance workflow
// selects an assignee. License and insurance validity gate eligibility for
// reassignment after an SLA breach.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::work_order::WorkOrderCategory;

/// A maintenance vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    /// Rolling performance score, higher is better. Used as the ranking key
    /// for vendor selection.
    pub performance_score: f64,
    /// Trade categories this vendor covers.
    pub categories: Vec<WorkOrderCategory>,
    /// License expiry. None means no license on file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_expires_at: Option<DateTime<Utc>>,
    pub insurance_valid: bool,
}

impl Vendor {
    /// Whether the vendor's license is valid at `now`.
    ///
    /// A vendor with no license on file is treated as expired — fail-closed,
    /// the same way an invalid policy pattern never matches.
    pub fn license_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.license_expires_at {
            Some(expiry) => expiry > now,
            None => false,
        }
    }

    /// Whether the vendor covers the given category.
    pub fn covers(&self, category: WorkOrderCategory) -> bool {
        self.categories.contains(&category)
    }
}
