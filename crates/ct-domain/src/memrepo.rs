// memrepo.rs — In-memory repository implementations.
//
// `Mutex<HashMap>` per aggregate. These back every downstream test suite and
// serve as the reference for what a database-backed implementation must
// provide. Locks are held only for the duration of one operation, so the
// concurrent-upsert contract from repo.rs holds.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::compliance::{ComplianceItem, ComplianceStatus, PmSchedule};
use crate::error::DomainError;
use crate::messaging::{MessageThread, ThreadStatus};
use crate::property::{Incident, Lease, Property};
use crate::repo::{
    BidRepo, ComplianceRepo, IncidentRepo, LeaseRepo, MessageRepo, PmScheduleRepo, PropertyRepo,
    Repos, VendorRepo, WorkOrderRepo,
};
use crate::vendor::Vendor;
use crate::work_order::{Bid, WorkOrder, WorkOrderCategory};

fn lock_err<T>(_: T) -> DomainError {
    DomainError::Storage("repository lock poisoned".to_string())
}

/// Lock acquisition for the seeding helpers, which return no Result. Every
/// critical section here is a single map operation, so a poisoned mutex
/// still guards a consistent map; recover the guard rather than panic.
fn seed_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct InMemoryPropertyRepo {
    items: Mutex<HashMap<Uuid, Property>>,
}

impl InMemoryPropertyRepo {
    pub fn add(&self, property: Property) {
        seed_lock(&self.items).insert(property.id, property);
    }
}

impl PropertyRepo for InMemoryPropertyRepo {
    fn get(&self, id: Uuid) -> Result<Option<Property>, DomainError> {
        Ok(self.items.lock().map_err(lock_err)?.get(&id).cloned())
    }

    fn for_manager(&self, manager_id: Uuid) -> Result<Vec<Property>, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|p| p.manager_id == manager_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryWorkOrderRepo {
    items: Mutex<HashMap<Uuid, WorkOrder>>,
}

impl InMemoryWorkOrderRepo {
    pub fn add(&self, work_order: WorkOrder) {
        seed_lock(&self.items).insert(work_order.id, work_order);
    }

    /// All stored work orders, for test assertions.
    pub fn all(&self) -> Vec<WorkOrder> {
        seed_lock(&self.items).values().cloned().collect()
    }
}

impl WorkOrderRepo for InMemoryWorkOrderRepo {
    fn get(&self, id: Uuid) -> Result<Option<WorkOrder>, DomainError> {
        Ok(self.items.lock().map_err(lock_err)?.get(&id).cloned())
    }

    fn insert(&self, work_order: &WorkOrder) -> Result<(), DomainError> {
        self.items
            .lock()
            .map_err(lock_err)?
            .insert(work_order.id, work_order.clone());
        Ok(())
    }

    fn update(&self, work_order: &WorkOrder) -> Result<(), DomainError> {
        self.items
            .lock()
            .map_err(lock_err)?
            .insert(work_order.id, work_order.clone());
        Ok(())
    }

    fn open_with_title(
        &self,
        property_id: Uuid,
        title: &str,
    ) -> Result<Option<WorkOrder>, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .find(|w| w.property_id == property_id && w.title == title && !w.status.is_terminal())
            .cloned())
    }

    fn open_count_for_vendor(&self, vendor_id: Uuid) -> Result<u32, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|w| w.assigned_vendor_id == Some(vendor_id) && !w.status.is_terminal())
            .count() as u32)
    }

    fn unassigned_open(&self, property_ids: &[Uuid]) -> Result<Vec<WorkOrder>, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|w| {
                property_ids.contains(&w.property_id)
                    && w.assigned_vendor_id.is_none()
                    && !w.status.is_terminal()
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryVendorRepo {
    items: Mutex<HashMap<Uuid, Vendor>>,
    /// (vendor_id, property_id) approval links.
    links: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl InMemoryVendorRepo {
    pub fn add(&self, vendor: Vendor) {
        seed_lock(&self.items).insert(vendor.id, vendor);
    }

    pub fn link(&self, vendor_id: Uuid, property_id: Uuid) {
        seed_lock(&self.links).insert((vendor_id, property_id));
    }
}

impl VendorRepo for InMemoryVendorRepo {
    fn get(&self, id: Uuid) -> Result<Option<Vendor>, DomainError> {
        Ok(self.items.lock().map_err(lock_err)?.get(&id).cloned())
    }

    fn active_for_category(
        &self,
        category: WorkOrderCategory,
    ) -> Result<Vec<Vendor>, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|v| v.active && v.covers(category))
            .cloned()
            .collect())
    }

    fn linked_to_property(
        &self,
        vendor_id: Uuid,
        property_id: Uuid,
    ) -> Result<bool, DomainError> {
        Ok(self
            .links
            .lock()
            .map_err(lock_err)?
            .contains(&(vendor_id, property_id)))
    }
}

#[derive(Default)]
pub struct InMemoryBidRepo {
    items: Mutex<HashMap<Uuid, Bid>>,
}

impl InMemoryBidRepo {
    pub fn add(&self, bid: Bid) {
        seed_lock(&self.items).insert(bid.id, bid);
    }
}

impl BidRepo for InMemoryBidRepo {
    fn get(&self, id: Uuid) -> Result<Option<Bid>, DomainError> {
        Ok(self.items.lock().map_err(lock_err)?.get(&id).cloned())
    }

    fn insert(&self, bid: &Bid) -> Result<(), DomainError> {
        self.items
            .lock()
            .map_err(lock_err)?
            .insert(bid.id, bid.clone());
        Ok(())
    }

    fn update(&self, bid: &Bid) -> Result<(), DomainError> {
        self.items
            .lock()
            .map_err(lock_err)?
            .insert(bid.id, bid.clone());
        Ok(())
    }

    fn for_work_order(&self, work_order_id: Uuid) -> Result<Vec<Bid>, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|b| b.work_order_id == work_order_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryComplianceRepo {
    items: Mutex<HashMap<Uuid, ComplianceItem>>,
}

impl InMemoryComplianceRepo {
    pub fn add(&self, item: ComplianceItem) {
        seed_lock(&self.items).insert(item.id, item);
    }
}

impl ComplianceRepo for InMemoryComplianceRepo {
    fn get(&self, id: Uuid) -> Result<Option<ComplianceItem>, DomainError> {
        Ok(self.items.lock().map_err(lock_err)?.get(&id).cloned())
    }

    fn update(&self, item: &ComplianceItem) -> Result<(), DomainError> {
        self.items
            .lock()
            .map_err(lock_err)?
            .insert(item.id, item.clone());
        Ok(())
    }

    fn open_items_due_before(
        &self,
        property_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ComplianceItem>, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|i| {
                i.property_id == property_id
                    && matches!(
                        i.status,
                        ComplianceStatus::Pending | ComplianceStatus::Overdue
                    )
                    && i.due_at <= cutoff
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryPmScheduleRepo {
    items: Mutex<HashMap<Uuid, PmSchedule>>,
}

impl InMemoryPmScheduleRepo {
    pub fn add(&self, schedule: PmSchedule) {
        seed_lock(&self.items).insert(schedule.id, schedule);
    }
}

impl PmScheduleRepo for InMemoryPmScheduleRepo {
    fn get(&self, id: Uuid) -> Result<Option<PmSchedule>, DomainError> {
        Ok(self.items.lock().map_err(lock_err)?.get(&id).cloned())
    }

    fn update(&self, schedule: &PmSchedule) -> Result<(), DomainError> {
        self.items
            .lock()
            .map_err(lock_err)?
            .insert(schedule.id, schedule.clone());
        Ok(())
    }

    fn active_for_property(&self, property_id: Uuid) -> Result<Vec<PmSchedule>, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|s| s.property_id == property_id && s.active)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryLeaseRepo {
    items: Mutex<HashMap<Uuid, Lease>>,
}

impl InMemoryLeaseRepo {
    pub fn add(&self, lease: Lease) {
        seed_lock(&self.items).insert(lease.id, lease);
    }
}

impl LeaseRepo for InMemoryLeaseRepo {
    fn expiring_without_offer(
        &self,
        property_ids: &[Uuid],
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Lease>, DomainError> {
        Ok(self
            .items
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|l| {
                property_ids.contains(&l.property_id)
                    && l.ends_at <= cutoff
                    && !l.renewal_offer_pending
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepo {
    threads: Mutex<HashMap<Uuid, MessageThread>>,
}

impl InMemoryMessageRepo {
    pub fn add(&self, thread: MessageThread) {
        seed_lock(&self.threads).insert(thread.id, thread);
    }
}

impl MessageRepo for InMemoryMessageRepo {
    fn get_thread(&self, id: Uuid) -> Result<Option<MessageThread>, DomainError> {
        Ok(self.threads.lock().map_err(lock_err)?.get(&id).cloned())
    }

    fn update_thread(&self, thread: &MessageThread) -> Result<(), DomainError> {
        self.threads
            .lock()
            .map_err(lock_err)?
            .insert(thread.id, thread.clone());
        Ok(())
    }

    fn open_threads(&self, property_ids: &[Uuid]) -> Result<Vec<MessageThread>, DomainError> {
        Ok(self
            .threads
            .lock()
            .map_err(lock_err)?
            .values()
            .filter(|t| property_ids.contains(&t.property_id) && t.status == ThreadStatus::Open)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryIncidentRepo {
    items: Mutex<HashMap<Uuid, Incident>>,
}

impl InMemoryIncidentRepo {
    pub fn add(&self, incident: Incident) {
        seed_lock(&self.items).insert(incident.id, incident);
    }
}

impl IncidentRepo for InMemoryIncidentRepo {
    fn get(&self, id: Uuid) -> Result<Option<Incident>, DomainError> {
        Ok(self.items.lock().map_err(lock_err)?.get(&id).cloned())
    }
}

/// The in-memory repositories as concrete handles, plus a [`Repos`] bundle
/// view. Tests keep the concrete handles to seed data and assert on state
/// while passing the bundle to the code under test.
pub struct InMemoryPlatform {
    pub properties: Arc<InMemoryPropertyRepo>,
    pub work_orders: Arc<InMemoryWorkOrderRepo>,
    pub vendors: Arc<InMemoryVendorRepo>,
    pub bids: Arc<InMemoryBidRepo>,
    pub compliance: Arc<InMemoryComplianceRepo>,
    pub pm_schedules: Arc<InMemoryPmScheduleRepo>,
    pub leases: Arc<InMemoryLeaseRepo>,
    pub messages: Arc<InMemoryMessageRepo>,
    pub incidents: Arc<InMemoryIncidentRepo>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            properties: Arc::new(InMemoryPropertyRepo::default()),
            work_orders: Arc::new(InMemoryWorkOrderRepo::default()),
            vendors: Arc::new(InMemoryVendorRepo::default()),
            bids: Arc::new(InMemoryBidRepo::default()),
            compliance: Arc::new(InMemoryComplianceRepo::default()),
            pm_schedules: Arc::new(InMemoryPmScheduleRepo::default()),
            leases: Arc::new(InMemoryLeaseRepo::default()),
            messages: Arc::new(InMemoryMessageRepo::default()),
            incidents: Arc::new(InMemoryIncidentRepo::default()),
        }
    }

    /// Trait-object bundle for passing to workflows and the executor.
    pub fn repos(&self) -> Repos {
        Repos {
            properties: self.properties.clone(),
            work_orders: self.work_orders.clone(),
            vendors: self.vendors.clone(),
            bids: self.bids.clone(),
            compliance: self.compliance.clone(),
            pm_schedules: self.pm_schedules.clone(),
            leases: self.leases.clone(),
            messages: self.messages.clone(),
            incidents: self.incidents.clone(),
        }
    }
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_order::{WorkOrderPriority, WorkOrderStatus};
    use chrono::Duration;

    #[test]
    fn seeding_survives_a_poisoned_lock() {
        let repo = Arc::new(InMemoryWorkOrderRepo::default());
        let poisoner = repo.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.items.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let wo = WorkOrder::new(
            Uuid::new_v4(),
            "Fix leak",
            "",
            WorkOrderCategory::Plumbing,
            WorkOrderPriority::Medium,
            Utc::now(),
        );
        repo.add(wo);
        assert_eq!(repo.all().len(), 1);
    }

    #[test]
    fn open_count_excludes_terminal_orders() {
        let repo = InMemoryWorkOrderRepo::default();
        let vendor_id = Uuid::new_v4();
        let property_id = Uuid::new_v4();

        let mut open = WorkOrder::new(
            property_id,
            "Fix A",
            "",
            WorkOrderCategory::Plumbing,
            WorkOrderPriority::Medium,
            Utc::now(),
        );
        open.assigned_vendor_id = Some(vendor_id);
        open.status = WorkOrderStatus::Assigned;

        let mut done = WorkOrder::new(
            property_id,
            "Fix B",
            "",
            WorkOrderCategory::Plumbing,
            WorkOrderPriority::Medium,
            Utc::now(),
        );
        done.assigned_vendor_id = Some(vendor_id);
        done.status = WorkOrderStatus::Completed;

        repo.add(open);
        repo.add(done);

        assert_eq!(repo.open_count_for_vendor(vendor_id).unwrap(), 1);
    }

    #[test]
    fn open_with_title_matches_exact_title_only() {
        let repo = InMemoryWorkOrderRepo::default();
        let property_id = Uuid::new_v4();
        repo.add(WorkOrder::new(
            property_id,
            "Quarterly HVAC service",
            "",
            WorkOrderCategory::Hvac,
            WorkOrderPriority::Medium,
            Utc::now(),
        ));

        assert!(repo
            .open_with_title(property_id, "Quarterly HVAC service")
            .unwrap()
            .is_some());
        assert!(repo
            .open_with_title(property_id, "Annual HVAC service")
            .unwrap()
            .is_none());
    }

    #[test]
    fn vendor_links_are_directional_pairs() {
        let repo = InMemoryVendorRepo::default();
        let vendor = Uuid::new_v4();
        let property_a = Uuid::new_v4();
        let property_b = Uuid::new_v4();

        repo.link(vendor, property_a);
        assert!(repo.linked_to_property(vendor, property_a).unwrap());
        assert!(!repo.linked_to_property(vendor, property_b).unwrap());
    }

    #[test]
    fn compliance_scan_filters_status_and_cutoff() {
        let repo = InMemoryComplianceRepo::default();
        let property_id = Uuid::new_v4();
        let now = Utc::now();

        let pending = ComplianceItem {
            id: Uuid::new_v4(),
            property_id,
            title: "Boiler inspection".to_string(),
            category: crate::compliance::ComplianceCategory::Boiler,
            status: ComplianceStatus::Pending,
            due_at: now + Duration::days(5),
        };
        let resolved = ComplianceItem {
            id: Uuid::new_v4(),
            property_id,
            title: "Facade filing".to_string(),
            category: crate::compliance::ComplianceCategory::Facade,
            status: ComplianceStatus::Resolved,
            due_at: now + Duration::days(5),
        };
        let far_out = ComplianceItem {
            id: Uuid::new_v4(),
            property_id,
            title: "Elevator cert".to_string(),
            category: crate::compliance::ComplianceCategory::Elevator,
            status: ComplianceStatus::Pending,
            due_at: now + Duration::days(90),
        };
        repo.add(pending.clone());
        repo.add(resolved);
        repo.add(far_out);

        let found = repo
            .open_items_due_before(property_id, now + Duration::days(14))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, pending.id);
    }

    #[test]
    fn expiring_leases_skip_pending_offers() {
        let repo = InMemoryLeaseRepo::default();
        let property_id = Uuid::new_v4();
        let now = Utc::now();

        repo.add(Lease {
            id: Uuid::new_v4(),
            property_id,
            tenant_id: Uuid::new_v4(),
            ends_at: now + Duration::days(30),
            renewal_offer_pending: false,
        });
        repo.add(Lease {
            id: Uuid::new_v4(),
            property_id,
            tenant_id: Uuid::new_v4(),
            ends_at: now + Duration::days(30),
            renewal_offer_pending: true,
        });

        let found = repo
            .expiring_without_offer(&[property_id], now + Duration::days(60))
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
