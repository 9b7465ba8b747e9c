// sla.rs — SLA Breach Response.
//
// Fires when a work order blows past its SLA deadline. Raises the breach
// exception, marks the breach against the assigned vendor's record, and
// attempts a reassignment to a better candidate. A run on a genuinely
// breached work order always terminates Escalated; the breach itself needs a
// human even when the reassignment succeeds.

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use ct_domain::collab::{EntityRef, NotificationKind};
use ct_domain::error::DomainError;
use ct_domain::work_order::{WorkOrderPriority, WorkOrderStatus};
use ct_ledger::{Exception, ExceptionCategory, LedgerError, RunRecorder, Severity};
use ct_policy::{evaluate, PolicyRequest};

use crate::deps::{finish, Outcome, WorkflowDeps};
use crate::error::WorkflowError;
use crate::vendor_select::{first_allowed_vendor, rank_candidates};

/// Deadline given to the manager to acknowledge the breach.
const BREACH_RESPONSE_HOURS: i64 = 4;

/// Vendors with this many recorded breaches are excluded from reassignment.
const BREACH_EXCLUSION_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, Copy)]
pub struct SlaBreachTrigger {
    pub run_id: Uuid,
    pub work_order_id: Uuid,
}

pub fn run_sla_breach(deps: &WorkflowDeps, trigger: &SlaBreachTrigger) -> Result<(), LedgerError> {
    let mut recorder = RunRecorder::begin(deps.ledger.clone(), trigger.run_id)?;
    let result = execute(deps, trigger.work_order_id, &mut recorder);
    finish(recorder, result)
}

fn execute(
    deps: &WorkflowDeps,
    work_order_id: Uuid,
    recorder: &mut RunRecorder,
) -> Result<Outcome, WorkflowError> {
    let idx = recorder.step_start(
        "load_work_order",
        json!({ "work_order_id": work_order_id }),
    )?;
    let mut work_order = match deps.repos.work_orders.get(work_order_id)? {
        Some(work_order) => work_order,
        None => {
            let err = DomainError::not_found("work order", work_order_id);
            recorder.step_failed(idx, &err.to_string())?;
            return Err(err.into());
        }
    };
    // The breach detector can race a completion or a cancellation; a stale
    // trigger on a closed or un-SLA'd work order is not a breach.
    if work_order.status.is_terminal() || work_order.sla_due_at.is_none() {
        recorder.step_done(idx, json!({ "breached": false }))?;
        return Ok(Outcome::Completed(
            "work order closed or carries no SLA".to_string(),
        ));
    }
    recorder.step_done(idx, json!({ "breached": true }))?;

    let now = deps.clock.now();
    let severity = if work_order.priority >= WorkOrderPriority::High {
        Severity::Critical
    } else {
        Severity::High
    };
    recorder.exception(
        Exception::new(
            severity,
            ExceptionCategory::Sla,
            format!("SLA breached: {}", work_order.title),
            format!(
                "due {}, still {:?}",
                work_order
                    .sla_due_at
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default(),
                work_order.status
            ),
        )
        .with_property(work_order.property_id)
        .with_respond_by(now + Duration::hours(BREACH_RESPONSE_HOURS)),
    );
    deps.notify_manager(
        work_order.property_id,
        "SLA breach",
        &format!("'{}' missed its SLA deadline", work_order.title),
        NotificationKind::SlaBreach,
        Some(EntityRef::new("work_order", work_order.id)),
    )?;

    // The breach goes on the assigned vendor's record before any
    // reassignment decision.
    let breached_vendor = work_order.assigned_vendor_id;
    if let Some(vendor_id) = breached_vendor {
        let count = deps.memory.record_breach(vendor_id)?;
        recorder.log_memory_write(&format!(
            "breach count for vendor {} is now {}",
            vendor_id, count
        ));
    }

    let idx = recorder.step_start("reassign", json!({ "category": work_order.category }))?;
    let policy = deps.policies.effective_policy(work_order.property_id);
    let mut candidates = deps.repos.vendors.active_for_category(work_order.category)?;
    candidates.retain(|v| {
        Some(v.id) != breached_vendor
            && v.insurance_valid
            && v.license_valid_at(now)
            && deps
                .memory
                .breach_count(v.id)
                .unwrap_or(BREACH_EXCLUSION_THRESHOLD)
                < BREACH_EXCLUSION_THRESHOLD
    });
    let ranked = rank_candidates(candidates, None);

    let chosen = first_allowed_vendor(&ranked, |vendor| {
        let open = deps.repos.work_orders.open_count_for_vendor(vendor.id)?;
        let verdict = evaluate(
            &PolicyRequest::AssignVendor {
                priority: work_order.priority,
                category: work_order.category,
                vendor_open_orders: open,
            },
            &policy,
        );
        recorder.log_decision(
            &format!("reassign to {}", vendor.name),
            &verdict.decision.to_string(),
            &verdict.reason,
        );
        Ok::<_, WorkflowError>(verdict)
    })?;

    match chosen {
        Some(vendor) => {
            work_order.assigned_vendor_id = Some(vendor.id);
            work_order.status = WorkOrderStatus::Assigned;
            work_order.updated_at = now;
            deps.repos.work_orders.update(&work_order)?;
            recorder.log_api_call(
                "reassigned breached work order",
                &json!({ "work_order_id": work_order.id, "vendor_id": vendor.id }),
            );
            if let Some(tenant_id) = work_order.tenant_id {
                deps.notifier.deliver(
                    tenant_id,
                    "Your repair has been expedited",
                    &format!(
                        "We've brought in {} to get '{}' finished as quickly as possible.",
                        vendor.name, work_order.title
                    ),
                    NotificationKind::WorkOrder,
                    Some(EntityRef::new("work_order", work_order.id)),
                );
            }
            deps.notify_manager(
                work_order.property_id,
                "Breached work order reassigned",
                &format!("'{}' reassigned to {}", work_order.title, vendor.name),
                NotificationKind::WorkOrder,
                Some(EntityRef::new("work_order", work_order.id)),
            )?;
            recorder.step_done(idx, json!({ "vendor_id": vendor.id }))?;
            Ok(Outcome::Escalated(
                "breach recorded, work order reassigned".to_string(),
            ))
        }
        None => {
            recorder.step_done(idx, json!({ "vendor_id": null }))?;
            Ok(Outcome::Escalated(
                "breach recorded, no eligible replacement vendor".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fixture, Fixture};
    use ct_domain::work_order::{
        WorkOrder, WorkOrderCategory, WorkOrderPriority, WorkOrderStatus,
    };
    use ct_ledger::{RunStatus, TriggerType};
    use ct_domain::repo::{VendorRepo, WorkOrderRepo};
    use ct_domain::Clock;

    /// An assigned, SLA-carrying work order that is already past due.
    fn seed_breached(f: &Fixture, vendor_id: Uuid, priority: WorkOrderPriority) -> WorkOrder {
        let now = f.clock.now();
        let mut wo = WorkOrder::new(
            f.property_id,
            "Burst pipe in 3C",
            "Water damage spreading",
            WorkOrderCategory::Plumbing,
            priority,
            now - Duration::days(3),
        );
        wo.assigned_vendor_id = Some(vendor_id);
        wo.status = WorkOrderStatus::Assigned;
        wo.sla_due_at = Some(now - Duration::hours(6));
        wo.tenant_id = Some(Uuid::new_v4());
        f.platform.work_orders.add(wo.clone());
        wo
    }

    fn run(f: &Fixture, work_order_id: Uuid) -> Uuid {
        let run_id = f.queued_run(TriggerType::SlaBreach, &format!("sla-{}", work_order_id));
        run_sla_breach(
            &f.deps,
            &SlaBreachTrigger {
                run_id,
                work_order_id,
            },
        )
        .unwrap();
        run_id
    }

    #[test]
    fn breach_reassigns_and_notifies_tenant() {
        let f = fixture();
        let slow = f.add_vendor("Slow Pipes", 2.0, &[WorkOrderCategory::Plumbing]);
        let fast = f.add_vendor("Fast Pipes", 4.5, &[WorkOrderCategory::Plumbing]);
        let wo = seed_breached(&f, slow.id, WorkOrderPriority::High);

        let run_id = run(&f, wo.id);

        assert_eq!(f.run(run_id).status, RunStatus::Escalated);

        let exceptions = f.exceptions(run_id);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].severity, Severity::Critical);
        assert_eq!(exceptions[0].category, ExceptionCategory::Sla);
        assert!(exceptions[0].respond_by.is_some());

        let stored = f.platform.work_orders.get(wo.id).unwrap().unwrap();
        assert_eq!(stored.assigned_vendor_id, Some(fast.id));

        // The tenant heard about the expedite.
        assert!(f
            .notifier
            .deliveries()
            .iter()
            .any(|n| n.user_id == wo.tenant_id.unwrap()));
        // And the breach landed on the slow vendor's record.
        assert_eq!(f.deps.memory.breach_count(slow.id).unwrap(), 1);
    }

    #[test]
    fn medium_priority_breach_is_high_severity() {
        let f = fixture();
        let vendor = f.add_vendor("Acme", 3.0, &[WorkOrderCategory::Plumbing]);
        let wo = seed_breached(&f, vendor.id, WorkOrderPriority::Medium);

        let run_id = run(&f, wo.id);
        assert_eq!(f.exceptions(run_id)[0].severity, Severity::High);
    }

    #[test]
    fn terminal_work_order_short_circuits() {
        let f = fixture();
        let vendor = f.add_vendor("Acme", 3.0, &[WorkOrderCategory::Plumbing]);
        let mut wo = seed_breached(&f, vendor.id, WorkOrderPriority::High);
        wo.status = WorkOrderStatus::Completed;
        f.platform.work_orders.update(&wo).unwrap();

        let run_id = run(&f, wo.id);

        assert_eq!(f.run(run_id).status, RunStatus::Completed);
        assert!(f.exceptions(run_id).is_empty());
        assert_eq!(f.deps.memory.breach_count(vendor.id).unwrap(), 0);
    }

    #[test]
    fn work_order_without_sla_short_circuits() {
        let f = fixture();
        let vendor = f.add_vendor("Acme", 3.0, &[WorkOrderCategory::Plumbing]);
        let mut wo = seed_breached(&f, vendor.id, WorkOrderPriority::High);
        wo.sla_due_at = None;
        f.platform.work_orders.update(&wo).unwrap();

        let run_id = run(&f, wo.id);
        assert_eq!(f.run(run_id).status, RunStatus::Completed);
        assert!(f.exceptions(run_id).is_empty());
    }

    #[test]
    fn repeat_offenders_are_excluded_from_reassignment() {
        let f = fixture();
        let slow = f.add_vendor("Slow Pipes", 2.0, &[WorkOrderCategory::Plumbing]);
        let offender = f.add_vendor("Repeat Offender", 5.0, &[WorkOrderCategory::Plumbing]);
        for _ in 0..BREACH_EXCLUSION_THRESHOLD {
            f.deps.memory.record_breach(offender.id).unwrap();
        }
        let wo = seed_breached(&f, slow.id, WorkOrderPriority::High);

        let run_id = run(&f, wo.id);

        // The top-scored offender was skipped; nobody else is eligible.
        assert_eq!(f.run(run_id).status, RunStatus::Escalated);
        let stored = f.platform.work_orders.get(wo.id).unwrap().unwrap();
        assert_eq!(stored.assigned_vendor_id, Some(slow.id));
    }

    #[test]
    fn expired_license_is_excluded() {
        let f = fixture();
        let slow = f.add_vendor("Slow Pipes", 2.0, &[WorkOrderCategory::Plumbing]);
        let lapsed = f.add_vendor("Lapsed LLC", 5.0, &[WorkOrderCategory::Plumbing]);
        let mut lapsed_vendor = f.platform.vendors.get(lapsed.id).unwrap().unwrap();
        lapsed_vendor.license_expires_at = Some(f.clock.now() - Duration::days(1));
        f.platform.vendors.add(lapsed_vendor);
        let wo = seed_breached(&f, slow.id, WorkOrderPriority::High);

        let run_id = run(&f, wo.id);

        assert_eq!(f.run(run_id).status, RunStatus::Escalated);
        let stored = f.platform.work_orders.get(wo.id).unwrap().unwrap();
        assert_eq!(stored.assigned_vendor_id, Some(slow.id));
    }

    #[test]
    fn failed_reassignment_still_escalates() {
        let f = fixture();
        let vendor = f.add_vendor("Only Option", 3.0, &[WorkOrderCategory::Plumbing]);
        let wo = seed_breached(&f, vendor.id, WorkOrderPriority::High);

        let run_id = run(&f, wo.id);

        // The assignee is the only plumbing vendor; no reassignment happens
        // but the breach still terminates Escalated.
        assert_eq!(f.run(run_id).status, RunStatus::Escalated);
        assert_eq!(f.exceptions(run_id).len(), 1);
        let stored = f.platform.work_orders.get(wo.id).unwrap().unwrap();
        assert_eq!(stored.assigned_vendor_id, Some(vendor.id));
    }
}
