// repo.rs — Repository traits, one per aggregate.
//
// The core depends only on these interfaces; the platform's database sits
// behind them. Each trait exposes exactly the filtered queries the workflows
// and the action executor need — no generic query language, no ORM leakage.
//
// All implementations must support safe concurrent use: runs for different
// triggers execute as independent tasks and share nothing but persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::compliance::{ComplianceItem, PmSchedule};
use crate::error::DomainError;
use crate::messaging::MessageThread;
use crate::property::{Incident, Lease, Property};
use crate::vendor::Vendor;
use crate::work_order::{Bid, WorkOrder, WorkOrderCategory};

pub trait PropertyRepo: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<Property>, DomainError>;

    /// All properties owned by a manager — the actor's authorization scope.
    fn for_manager(&self, manager_id: Uuid) -> Result<Vec<Property>, DomainError>;
}

pub trait WorkOrderRepo: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<WorkOrder>, DomainError>;

    fn insert(&self, work_order: &WorkOrder) -> Result<(), DomainError>;

    fn update(&self, work_order: &WorkOrder) -> Result<(), DomainError>;

    /// A non-terminal work order at the property with this exact title, if
    /// one exists. Used by the maintenance workflow to reuse open PM work
    /// instead of duplicating it.
    fn open_with_title(
        &self,
        property_id: Uuid,
        title: &str,
    ) -> Result<Option<WorkOrder>, DomainError>;

    /// Count of non-terminal work orders currently assigned to a vendor.
    /// This is the live context behind the per-vendor capacity cap.
    fn open_count_for_vendor(&self, vendor_id: Uuid) -> Result<u32, DomainError>;

    /// Unassigned, non-terminal work orders across a set of properties.
    fn unassigned_open(&self, property_ids: &[Uuid]) -> Result<Vec<WorkOrder>, DomainError>;
}

pub trait VendorRepo: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<Vendor>, DomainError>;

    /// Active vendors covering a trade category, unsorted.
    fn active_for_category(
        &self,
        category: WorkOrderCategory,
    ) -> Result<Vec<Vendor>, DomainError>;

    /// Whether a vendor is linked to (approved for) a property. The link is
    /// part of the ownership chain checked by the action validator.
    fn linked_to_property(&self, vendor_id: Uuid, property_id: Uuid)
        -> Result<bool, DomainError>;
}

pub trait BidRepo: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<Bid>, DomainError>;

    fn insert(&self, bid: &Bid) -> Result<(), DomainError>;

    fn update(&self, bid: &Bid) -> Result<(), DomainError>;

    /// All bids on a work order, any status.
    fn for_work_order(&self, work_order_id: Uuid) -> Result<Vec<Bid>, DomainError>;
}

pub trait ComplianceRepo: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<ComplianceItem>, DomainError>;

    fn update(&self, item: &ComplianceItem) -> Result<(), DomainError>;

    /// Pending and Overdue items at the property due at or before `cutoff`.
    fn open_items_due_before(
        &self,
        property_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ComplianceItem>, DomainError>;
}

pub trait PmScheduleRepo: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<PmSchedule>, DomainError>;

    fn update(&self, schedule: &PmSchedule) -> Result<(), DomainError>;

    fn active_for_property(&self, property_id: Uuid) -> Result<Vec<PmSchedule>, DomainError>;
}

pub trait LeaseRepo: Send + Sync {
    /// Leases across the given properties ending at or before `cutoff` with
    /// no renewal offer pending.
    fn expiring_without_offer(
        &self,
        property_ids: &[Uuid],
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Lease>, DomainError>;
}

pub trait MessageRepo: Send + Sync {
    fn get_thread(&self, id: Uuid) -> Result<Option<MessageThread>, DomainError>;

    /// Persist a thread, including any newly appended messages.
    fn update_thread(&self, thread: &MessageThread) -> Result<(), DomainError>;

    fn open_threads(&self, property_ids: &[Uuid]) -> Result<Vec<MessageThread>, DomainError>;
}

pub trait IncidentRepo: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<Incident>, DomainError>;
}

/// The full set of repositories, bundled so workflows and the executor take
/// one dependency instead of nine.
#[derive(Clone)]
pub struct Repos {
    pub properties: Arc<dyn PropertyRepo>,
    pub work_orders: Arc<dyn WorkOrderRepo>,
    pub vendors: Arc<dyn VendorRepo>,
    pub bids: Arc<dyn BidRepo>,
    pub compliance: Arc<dyn ComplianceRepo>,
    pub pm_schedules: Arc<dyn PmScheduleRepo>,
    pub leases: Arc<dyn LeaseRepo>,
    pub messages: Arc<dyn MessageRepo>,
    pub incidents: Arc<dyn IncidentRepo>,
}
