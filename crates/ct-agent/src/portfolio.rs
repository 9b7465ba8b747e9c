// portfolio.rs — The manager's portfolio snapshot.
//
// The session loop opens with a text rendering of everything across the
// manager's properties that plausibly needs attention: unassigned work
// orders, work orders with submitted bids awaiting a decision, open message
// threads, and leases expiring soon with no renewal offer out. The model
// reasons over this text; the typed data stays here for tests and tooling.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use ct_domain::error::DomainError;
use ct_domain::messaging::MessageThread;
use ct_domain::property::{Lease, Property};
use ct_domain::repo::Repos;
use ct_domain::work_order::{BidStatus, WorkOrder};

/// Leases ending within this many days count as expiring.
const LEASE_HORIZON_DAYS: i64 = 60;

#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub properties: Vec<Property>,
    pub unassigned_work_orders: Vec<WorkOrder>,
    /// Work orders with at least one submitted bid, with the bid count.
    pub work_orders_with_bids: Vec<(WorkOrder, usize)>,
    pub open_threads: Vec<MessageThread>,
    pub expiring_leases: Vec<Lease>,
}

impl PortfolioSnapshot {
    pub fn gather(
        repos: &Repos,
        manager_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let properties = repos.properties.for_manager(manager_id)?;
        let property_ids: Vec<Uuid> = properties.iter().map(|p| p.id).collect();

        let unassigned = repos.work_orders.unassigned_open(&property_ids)?;
        let mut with_bids = Vec::new();
        for work_order in &unassigned {
            let submitted = repos
                .bids
                .for_work_order(work_order.id)?
                .into_iter()
                .filter(|b| b.status == BidStatus::Submitted)
                .count();
            if submitted > 0 {
                with_bids.push((work_order.clone(), submitted));
            }
        }

        let open_threads = repos.messages.open_threads(&property_ids)?;
        let expiring_leases = repos
            .leases
            .expiring_without_offer(&property_ids, now + Duration::days(LEASE_HORIZON_DAYS))?;

        Ok(Self {
            properties,
            unassigned_work_orders: unassigned,
            work_orders_with_bids: with_bids,
            open_threads,
            expiring_leases,
        })
    }

    /// Render the snapshot as the standing context for a session.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Portfolio: {} properties.\n",
            self.properties.len()
        ));

        out.push_str(&format!(
            "Unassigned work orders ({}):\n",
            self.unassigned_work_orders.len()
        ));
        for wo in &self.unassigned_work_orders {
            out.push_str(&format!(
                "  - {} [{}] {:?} priority (id {})\n",
                wo.title, wo.category, wo.priority, wo.id
            ));
        }

        out.push_str(&format!(
            "Work orders with submitted bids ({}):\n",
            self.work_orders_with_bids.len()
        ));
        for (wo, count) in &self.work_orders_with_bids {
            out.push_str(&format!(
                "  - {} has {} submitted bid(s) (id {})\n",
                wo.title, count, wo.id
            ));
        }

        out.push_str(&format!(
            "Open message threads ({}):\n",
            self.open_threads.len()
        ));
        for thread in &self.open_threads {
            out.push_str(&format!(
                "  - thread {} ({} messages)\n",
                thread.id,
                thread.messages.len()
            ));
        }

        out.push_str(&format!(
            "Leases expiring within {} days with no renewal offer ({}):\n",
            LEASE_HORIZON_DAYS,
            self.expiring_leases.len()
        ));
        for lease in &self.expiring_leases {
            out.push_str(&format!(
                "  - lease {} ends {}\n",
                lease.id,
                lease.ends_at.date_naive()
            ));
        }
        out
    }
}
