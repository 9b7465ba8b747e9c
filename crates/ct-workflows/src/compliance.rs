// compliance.rs — Compliance Sweep.
//
// Scans a property's open compliance items inside the critical window,
// creates remediation work orders where policy allows, and raises exceptions
// where it does not. Also audits preventive-maintenance schedules for
// stalled recurrences. A sweep that raises any exception terminates the run
// Escalated; a clean sweep Completes.

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use ct_domain::collab::NotificationKind;
use ct_domain::compliance::{ComplianceItem, ComplianceStatus};
use ct_domain::work_order::{WorkOrder, WorkOrderPriority};
use ct_ledger::{Exception, ExceptionCategory, LedgerError, RunRecorder, Severity};
use ct_policy::{evaluate, Decision, PolicyRequest};

use crate::deps::{finish, Outcome, WorkflowDeps};
use crate::error::WorkflowError;

/// A PM schedule counts as stalled once it sits past due by more than
/// max(this floor, half its own frequency).
const PM_STALL_FLOOR_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy)]
pub struct ComplianceTrigger {
    pub run_id: Uuid,
    pub property_id: Uuid,
}

pub fn run_compliance(deps: &WorkflowDeps, trigger: &ComplianceTrigger) -> Result<(), LedgerError> {
    let mut recorder = RunRecorder::begin(deps.ledger.clone(), trigger.run_id)?;
    let result = execute(deps, trigger.property_id, &mut recorder);
    finish(recorder, result)
}

fn execute(
    deps: &WorkflowDeps,
    property_id: Uuid,
    recorder: &mut RunRecorder,
) -> Result<Outcome, WorkflowError> {
    let now = deps.clock.now();
    let policy = deps.policies.effective_policy(property_id);
    let window = Duration::days(policy.compliance.critical_window_days);

    let idx = recorder.step_start(
        "scan_items",
        json!({ "property_id": property_id, "window_days": policy.compliance.critical_window_days }),
    )?;
    let items = deps
        .repos
        .compliance
        .open_items_due_before(property_id, now + window)?;
    recorder.step_done(idx, json!({ "items": items.len() }))?;

    let mut wo_created: u64 = 0;
    let mut exceptions: u64 = 0;

    for item in &items {
        let overdue = item.status == ComplianceStatus::Overdue || item.due_at < now;
        let verdict = evaluate(&PolicyRequest::CreateComplianceTask { overdue }, &policy);
        recorder.log_decision(
            &format!("remediation for '{}'", item.title),
            &verdict.decision.to_string(),
            &verdict.reason,
        );

        match verdict.decision {
            Decision::Allow => {
                create_remediation(deps, recorder, item, overdue, window)?;
                wo_created += 1;
            }
            Decision::Block => {
                recorder.exception(
                    Exception::new(
                        Severity::Critical,
                        ExceptionCategory::Safety,
                        format!("Overdue compliance item: {}", item.title),
                        &verdict.reason,
                    )
                    .with_property(property_id),
                );
                exceptions += 1;
            }
            Decision::Approval => {
                recorder.exception(
                    Exception::new(
                        Severity::Medium,
                        ExceptionCategory::System,
                        format!("Compliance task awaiting approval: {}", item.title),
                        &verdict.reason,
                    )
                    .with_property(property_id)
                    .with_suggested_payload(json!({
                        "action": "create_compliance_task",
                        "compliance_item_id": item.id,
                    })),
                );
                exceptions += 1;
            }
        }
    }

    exceptions += audit_pm_schedules(deps, property_id, recorder)?;

    deps.memory
        .record_compliance_scan(property_id, wo_created, exceptions, now)?;
    recorder.log_memory_write(&format!("compliance scan snapshot for {}", property_id));

    deps.notify_manager(
        property_id,
        "Compliance sweep finished",
        &format!(
            "{} items scanned, {} work orders created, {} exceptions raised",
            items.len(),
            wo_created,
            exceptions
        ),
        NotificationKind::Compliance,
        None,
    )?;

    if exceptions > 0 {
        Ok(Outcome::Escalated(format!(
            "{} compliance exceptions raised",
            exceptions
        )))
    } else {
        Ok(Outcome::Completed(format!(
            "{} work orders created, no exceptions",
            wo_created
        )))
    }
}

/// Create the remediation work order for one item and flip it InProgress.
fn create_remediation(
    deps: &WorkflowDeps,
    recorder: &mut RunRecorder,
    item: &ComplianceItem,
    overdue: bool,
    window: Duration,
) -> Result<(), WorkflowError> {
    let now = deps.clock.now();
    // Overdue is an emergency; due in the near half of the window is High.
    let priority = if overdue {
        WorkOrderPriority::Emergency
    } else if item.due_at <= now + window / 2 {
        WorkOrderPriority::High
    } else {
        WorkOrderPriority::Medium
    };

    let idx = recorder.step_start(
        "create_remediation",
        json!({ "compliance_item_id": item.id, "priority": priority }),
    )?;
    let work_order = WorkOrder::new(
        item.property_id,
        &item.title,
        format!("Compliance remediation, due {}", item.due_at.to_rfc3339()),
        item.category.work_order_category(),
        priority,
        now,
    );
    deps.repos.work_orders.insert(&work_order)?;

    let mut updated = item.clone();
    updated.status = ComplianceStatus::InProgress;
    deps.repos.compliance.update(&updated)?;

    recorder.log_api_call(
        "created compliance remediation work order",
        &json!({ "work_order_id": work_order.id, "compliance_item_id": item.id }),
    );
    recorder.step_done(idx, json!({ "work_order_id": work_order.id }))?;
    Ok(())
}

/// Flag PM schedules whose next-due date is stalled well in the past.
/// Audit-only: errors here are absorbed so a bad schedule cannot sink the
/// compliance scan itself.
fn audit_pm_schedules(
    deps: &WorkflowDeps,
    property_id: Uuid,
    recorder: &mut RunRecorder,
) -> Result<u64, WorkflowError> {
    let idx = recorder.step_start("audit_pm_schedules", json!({}))?;
    let schedules = match deps.repos.pm_schedules.active_for_property(property_id) {
        Ok(schedules) => schedules,
        Err(error) => {
            tracing::warn!(property_id = %property_id, "pm schedule audit skipped: {}", error);
            recorder.step_failed(idx, &error.to_string())?;
            return Ok(0);
        }
    };

    let now = deps.clock.now();
    let mut flagged: u64 = 0;
    for schedule in &schedules {
        let tolerance = Duration::days(PM_STALL_FLOOR_DAYS.max(schedule.frequency_days / 2));
        if now - schedule.next_due_at > tolerance {
            recorder.exception(
                Exception::new(
                    Severity::Medium,
                    ExceptionCategory::System,
                    format!("Stalled PM schedule: {}", schedule.title),
                    format!(
                        "next due {} has not advanced; check the maintenance trigger",
                        schedule.next_due_at.to_rfc3339()
                    ),
                )
                .with_property(property_id),
            );
            flagged += 1;
        }
    }
    recorder.step_done(idx, json!({ "schedules": schedules.len(), "flagged": flagged }))?;
    Ok(flagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fixture, Fixture};
    use chrono::{DateTime, Utc};
    use ct_domain::compliance::{ComplianceCategory, PmSchedule};
    use ct_domain::repo::ComplianceRepo;
    use ct_domain::Clock;
    use ct_domain::work_order::WorkOrderCategory;
    use ct_ledger::{RunStatus, TriggerType};

    fn seed_item(
        f: &Fixture,
        title: &str,
        status: ComplianceStatus,
        due_at: DateTime<Utc>,
    ) -> ComplianceItem {
        let item = ComplianceItem {
            id: Uuid::new_v4(),
            property_id: f.property_id,
            title: title.to_string(),
            category: ComplianceCategory::Boiler,
            status,
            due_at,
        };
        f.platform.compliance.add(item.clone());
        item
    }

    fn run(f: &Fixture) -> Uuid {
        let run_id = f.queued_run(TriggerType::ComplianceScan, "scan-1");
        run_compliance(
            &f.deps,
            &ComplianceTrigger {
                run_id,
                property_id: f.property_id,
            },
        )
        .unwrap();
        run_id
    }

    #[test]
    fn mixed_scan_creates_work_and_escalates_overdue() {
        let f = fixture();
        let now = f.clock.now();
        let pending = seed_item(&f, "Boiler inspection", ComplianceStatus::Pending, now + Duration::days(5));
        seed_item(&f, "Elevator cert", ComplianceStatus::Overdue, now - Duration::days(2));

        let run_id = run(&f);

        // Overdue item blocks under the default policy, so the run escalates.
        assert_eq!(f.run(run_id).status, RunStatus::Escalated);

        // Exactly one work order, for the pending item.
        let orders = f.platform.work_orders.all();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].title, "Boiler inspection");

        let exceptions = f.exceptions(run_id);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].severity, Severity::Critical);
        assert_eq!(exceptions[0].category, ExceptionCategory::Safety);

        // The pending item flipped to InProgress; the overdue one did not.
        let stored = f.platform.compliance.get(pending.id).unwrap().unwrap();
        assert_eq!(stored.status, ComplianceStatus::InProgress);
    }

    #[test]
    fn due_soon_items_get_high_priority() {
        let f = fixture();
        let now = f.clock.now();
        // Inside the near half of the 14-day window.
        seed_item(&f, "Facade filing", ComplianceStatus::Pending, now + Duration::days(3));
        // In the far half.
        seed_item(&f, "Lead paint notice", ComplianceStatus::Pending, now + Duration::days(12));

        let run_id = run(&f);
        assert_eq!(f.run(run_id).status, RunStatus::Completed);

        let orders = f.platform.work_orders.all();
        let near = orders.iter().find(|w| w.title == "Facade filing").unwrap();
        let far = orders.iter().find(|w| w.title == "Lead paint notice").unwrap();
        assert_eq!(near.priority, WorkOrderPriority::High);
        assert_eq!(far.priority, WorkOrderPriority::Medium);
    }

    #[test]
    fn clean_sweep_completes_and_notifies() {
        let f = fixture();
        let run_id = run(&f);
        assert_eq!(f.run(run_id).status, RunStatus::Completed);
        assert!(f.exceptions(run_id).is_empty());
        assert!(f
            .notifier
            .deliveries()
            .iter()
            .any(|n| n.user_id == f.manager && n.kind == NotificationKind::Compliance));
    }

    #[test]
    fn scan_snapshot_accumulates_across_runs() {
        let f = fixture();
        let now = f.clock.now();
        seed_item(&f, "Overdue A", ComplianceStatus::Overdue, now - Duration::days(1));
        run(&f);

        seed_item(&f, "Overdue B", ComplianceStatus::Overdue, now - Duration::days(1));
        let run_id = f.queued_run(TriggerType::ComplianceScan, "scan-2");
        run_compliance(
            &f.deps,
            &ComplianceTrigger {
                run_id,
                property_id: f.property_id,
            },
        )
        .unwrap();

        let snapshot = f
            .deps
            .memory
            .compliance_scan(f.property_id)
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.exceptions, 1);
        assert_eq!(snapshot.total_exceptions_all_time, 2);
    }

    #[test]
    fn stalled_pm_schedule_is_flagged() {
        let f = fixture();
        let now = f.clock.now();
        f.platform.pm_schedules.add(PmSchedule {
            id: Uuid::new_v4(),
            property_id: f.property_id,
            title: "Quarterly HVAC service".to_string(),
            category: WorkOrderCategory::Hvac,
            frequency_days: 90,
            // 90-day frequency tolerates 45 days; 60 is stalled.
            next_due_at: now - Duration::days(60),
            active: false,
        });
        f.platform.pm_schedules.add(PmSchedule {
            id: Uuid::new_v4(),
            property_id: f.property_id,
            title: "Monthly filter swap".to_string(),
            category: WorkOrderCategory::Hvac,
            frequency_days: 30,
            // 30-day frequency tolerates 15 days; 20 is stalled.
            next_due_at: now - Duration::days(20),
            active: true,
        });

        let run_id = run(&f);

        // Only the active schedule is audited.
        assert_eq!(f.run(run_id).status, RunStatus::Escalated);
        let exceptions = f.exceptions(run_id);
        assert_eq!(exceptions.len(), 1);
        assert!(exceptions[0].title.contains("Monthly filter swap"));
    }

    #[test]
    fn recently_due_pm_schedule_is_within_tolerance() {
        let f = fixture();
        let now = f.clock.now();
        f.platform.pm_schedules.add(PmSchedule {
            id: Uuid::new_v4(),
            property_id: f.property_id,
            title: "Weekly walkthrough".to_string(),
            category: WorkOrderCategory::General,
            frequency_days: 7,
            // 7-day frequency floors at 3 days of tolerance; 2 is fine.
            next_due_at: now - Duration::days(2),
            active: true,
        });

        let run_id = run(&f);
        assert_eq!(f.run(run_id).status, RunStatus::Completed);
        assert!(f.exceptions(run_id).is_empty());
    }
}
