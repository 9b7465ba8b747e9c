// maintenance.rs — Maintenance Autopilot.
//
// Three triggers feed this workflow: a preventive-maintenance schedule came
// due, a new incident was reported, or a work order sat unassigned past its
// grace window. All three funnel into the same vendor-selection tail.
//
// Two rules that must not drift:
//   - PM cadence advances from the current due date, never from "now", so a
//     late run does not push the whole schedule later.
//   - Critical incidents bypass policy entirely; no automation touches them.

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use ct_domain::collab::{EntityRef, NotificationKind};
use ct_domain::error::DomainError;
use ct_domain::property::IncidentSeverity;
use ct_domain::work_order::{WorkOrder, WorkOrderPriority, WorkOrderStatus};
use ct_ledger::{Exception, ExceptionCategory, LedgerError, RunRecorder, Severity};
use ct_policy::{evaluate, Decision, PolicyRequest};

use crate::deps::{finish, Outcome, WorkflowDeps};
use crate::error::WorkflowError;
use crate::vendor_select::{first_allowed_vendor, rank_candidates};

/// What fired the maintenance workflow.
#[derive(Debug, Clone, Copy)]
pub enum MaintenanceTriggerKind {
    PmDue { schedule_id: Uuid },
    NewIncident { incident_id: Uuid },
    UnassignedWorkOrder { work_order_id: Uuid },
}

#[derive(Debug, Clone, Copy)]
pub struct MaintenanceTrigger {
    pub run_id: Uuid,
    pub kind: MaintenanceTriggerKind,
}

/// Entry point. The outcome lands in the ledger; the only error surfaced to
/// the caller is a ledger fault that prevented recording it.
pub fn run_maintenance(
    deps: &WorkflowDeps,
    trigger: &MaintenanceTrigger,
) -> Result<(), LedgerError> {
    let mut recorder = RunRecorder::begin(deps.ledger.clone(), trigger.run_id)?;
    let result = execute(deps, trigger.kind, &mut recorder);
    finish(recorder, result)
}

fn execute(
    deps: &WorkflowDeps,
    kind: MaintenanceTriggerKind,
    recorder: &mut RunRecorder,
) -> Result<Outcome, WorkflowError> {
    match kind {
        MaintenanceTriggerKind::PmDue { schedule_id } => pm_due(deps, schedule_id, recorder),
        MaintenanceTriggerKind::NewIncident { incident_id } => {
            incident(deps, incident_id, recorder)
        }
        MaintenanceTriggerKind::UnassignedWorkOrder { work_order_id } => {
            unassigned(deps, work_order_id, recorder)
        }
    }
}

fn pm_due(
    deps: &WorkflowDeps,
    schedule_id: Uuid,
    recorder: &mut RunRecorder,
) -> Result<Outcome, WorkflowError> {
    let idx = recorder.step_start("load_schedule", json!({ "schedule_id": schedule_id }))?;
    let mut schedule = match deps.repos.pm_schedules.get(schedule_id)? {
        Some(schedule) => schedule,
        None => {
            let err = DomainError::not_found("pm schedule", schedule_id);
            recorder.step_failed(idx, &err.to_string())?;
            return Err(err.into());
        }
    };
    recorder.step_done(idx, json!({ "title": schedule.title }))?;

    // Reuse an open work order for the same schedule title rather than
    // stacking duplicates when runs overlap a slow vendor.
    let idx = recorder.step_start("ensure_work_order", json!({ "title": schedule.title }))?;
    let (work_order, reused) = match deps
        .repos
        .work_orders
        .open_with_title(schedule.property_id, &schedule.title)?
    {
        Some(existing) => (existing, true),
        None => {
            let work_order = WorkOrder::new(
                schedule.property_id,
                &schedule.title,
                format!("Scheduled maintenance: {}", schedule.title),
                schedule.category,
                WorkOrderPriority::Medium,
                deps.clock.now(),
            );
            deps.repos.work_orders.insert(&work_order)?;
            recorder.log_api_call(
                "created preventive-maintenance work order",
                &json!({ "work_order_id": work_order.id, "schedule_id": schedule_id }),
            );
            (work_order, false)
        }
    };
    recorder.step_done(idx, json!({ "work_order_id": work_order.id, "reused": reused }))?;

    // Advance from the current due date, not from now.
    let idx = recorder.step_start("advance_schedule", json!({ "from": schedule.next_due_at }))?;
    schedule.next_due_at = schedule.next_due_at + Duration::days(schedule.frequency_days);
    deps.repos.pm_schedules.update(&schedule)?;
    recorder.step_done(idx, json!({ "next_due_at": schedule.next_due_at }))?;

    if work_order.assigned_vendor_id.is_some() {
        return Ok(Outcome::Completed(format!(
            "work order {} already assigned",
            work_order.id
        )));
    }
    assign_vendor(deps, work_order, recorder)
}

fn incident(
    deps: &WorkflowDeps,
    incident_id: Uuid,
    recorder: &mut RunRecorder,
) -> Result<Outcome, WorkflowError> {
    let idx = recorder.step_start("load_incident", json!({ "incident_id": incident_id }))?;
    let incident = match deps.repos.incidents.get(incident_id)? {
        Some(incident) => incident,
        None => {
            let err = DomainError::not_found("incident", incident_id);
            recorder.step_failed(idx, &err.to_string())?;
            return Err(err.into());
        }
    };
    recorder.step_done(idx, json!({ "severity": incident.severity }))?;

    // Critical incidents bypass policy: no work order, no vendor, straight
    // to a human.
    if incident.severity == IncidentSeverity::Critical {
        let idx = recorder.step_start("escalate_critical", json!({}))?;
        recorder.exception(
            Exception::new(
                Severity::Critical,
                ExceptionCategory::Safety,
                "Critical incident reported",
                &incident.description,
            )
            .with_property(incident.property_id),
        );
        deps.notify_manager(
            incident.property_id,
            "Critical incident",
            &incident.description,
            NotificationKind::Escalation,
            Some(EntityRef::new("incident", incident.id)),
        )?;
        recorder.step_done(idx, json!({}))?;
        return Ok(Outcome::Escalated(
            "critical incident escalated to the manager".to_string(),
        ));
    }

    let priority = match incident.severity {
        IncidentSeverity::High => WorkOrderPriority::High,
        IncidentSeverity::Medium => WorkOrderPriority::Medium,
        _ => WorkOrderPriority::Low,
    };

    let idx = recorder.step_start(
        "create_work_order",
        json!({ "category": incident.category, "priority": priority }),
    )?;
    let policy = deps.policies.effective_policy(incident.property_id);
    let verdict = evaluate(&PolicyRequest::CreateWorkOrder { priority }, &policy);
    recorder.log_decision(
        "work-order creation for incident",
        &verdict.decision.to_string(),
        &verdict.reason,
    );
    match verdict.decision {
        Decision::Allow => {}
        Decision::Block => {
            recorder.exception(
                Exception::new(
                    Severity::High,
                    ExceptionCategory::Safety,
                    "Incident work blocked by policy",
                    &verdict.reason,
                )
                .with_property(incident.property_id),
            );
            deps.notify_manager(
                incident.property_id,
                "Incident needs attention",
                &verdict.reason,
                NotificationKind::Escalation,
                Some(EntityRef::new("incident", incident.id)),
            )?;
            recorder.step_done(idx, json!({ "created": false }))?;
            return Ok(Outcome::Escalated("work-order creation blocked".to_string()));
        }
        Decision::Approval => {
            recorder.exception(
                Exception::new(
                    Severity::Medium,
                    ExceptionCategory::System,
                    "Incident work needs sign-off",
                    &verdict.reason,
                )
                .with_property(incident.property_id)
                .with_suggested_payload(json!({
                    "title": "Reported incident",
                    "description": incident.description,
                    "category": incident.category,
                    "priority": priority,
                })),
            );
            deps.notify_manager(
                incident.property_id,
                "Incident needs sign-off",
                &verdict.reason,
                NotificationKind::Escalation,
                Some(EntityRef::new("incident", incident.id)),
            )?;
            recorder.step_done(idx, json!({ "created": false }))?;
            return Ok(Outcome::Escalated(
                "work-order creation queued for approval".to_string(),
            ));
        }
    }

    let work_order = WorkOrder::new(
        incident.property_id,
        "Reported incident",
        &incident.description,
        incident.category,
        priority,
        deps.clock.now(),
    );
    deps.repos.work_orders.insert(&work_order)?;
    recorder.log_api_call(
        "created work order from incident",
        &json!({ "work_order_id": work_order.id, "incident_id": incident.id }),
    );
    recorder.step_done(idx, json!({ "created": true, "work_order_id": work_order.id }))?;

    assign_vendor(deps, work_order, recorder)
}

fn unassigned(
    deps: &WorkflowDeps,
    work_order_id: Uuid,
    recorder: &mut RunRecorder,
) -> Result<Outcome, WorkflowError> {
    let idx = recorder.step_start("load_work_order", json!({ "work_order_id": work_order_id }))?;
    let work_order = match deps.repos.work_orders.get(work_order_id)? {
        Some(work_order) => work_order,
        None => {
            let err = DomainError::not_found("work order", work_order_id);
            recorder.step_failed(idx, &err.to_string())?;
            return Err(err.into());
        }
    };
    recorder.step_done(idx, json!({ "status": work_order.status }))?;

    if work_order.status.is_terminal() || work_order.assigned_vendor_id.is_some() {
        return Ok(Outcome::Completed(
            "work order no longer needs assignment".to_string(),
        ));
    }
    assign_vendor(deps, work_order, recorder)
}

/// The shared vendor-selection tail: rank, prefer, walk the policy, assign
/// the first allowed candidate, remember the choice.
fn assign_vendor(
    deps: &WorkflowDeps,
    mut work_order: WorkOrder,
    recorder: &mut RunRecorder,
) -> Result<Outcome, WorkflowError> {
    let idx = recorder.step_start(
        "select_vendor",
        json!({ "work_order_id": work_order.id, "category": work_order.category }),
    )?;

    let policy = deps.policies.effective_policy(work_order.property_id);
    let preferred = deps
        .memory
        .preferred_vendor(work_order.property_id, work_order.category)?;
    recorder.log_memory_read(&format!(
        "preferred {} vendor at property {}",
        work_order.category, work_order.property_id
    ));

    let candidates = deps.repos.vendors.active_for_category(work_order.category)?;
    let ranked = rank_candidates(candidates, preferred);

    let chosen = first_allowed_vendor(&ranked, |vendor| -> Result<_, WorkflowError> {
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
            &format!("vendor {} considered", vendor.name),
            &verdict.decision.to_string(),
            &verdict.reason,
        );
        Ok(verdict)
    })?;

    match chosen {
        Some(vendor) => {
            work_order.assigned_vendor_id = Some(vendor.id);
            if work_order.status == WorkOrderStatus::New {
                work_order.status = WorkOrderStatus::Assigned;
            }
            work_order.updated_at = deps.clock.now();
            deps.repos.work_orders.update(&work_order)?;
            recorder.log_api_call(
                "assigned vendor",
                &json!({ "work_order_id": work_order.id, "vendor_id": vendor.id }),
            );

            deps.memory.set_preferred_vendor(
                work_order.property_id,
                work_order.category,
                vendor.id,
            )?;
            recorder.log_memory_write(&format!(
                "preferred {} vendor at property {} is now {}",
                work_order.category, work_order.property_id, vendor.name
            ));
            recorder.step_done(idx, json!({ "vendor_id": vendor.id }))?;

            deps.notify_manager(
                work_order.property_id,
                "Vendor assigned",
                &format!("'{}' assigned to {}", work_order.title, vendor.name),
                NotificationKind::WorkOrder,
                Some(EntityRef::new("work_order", work_order.id)),
            )?;
            Ok(Outcome::Completed(format!(
                "work order {} assigned to {}",
                work_order.id, vendor.name
            )))
        }
        None => {
            recorder.step_done(idx, json!({ "vendor_id": null }))?;
            recorder.exception(
                Exception::new(
                    Severity::High,
                    ExceptionCategory::Sla,
                    "No eligible vendor",
                    format!(
                        "no active {} vendor passed policy for '{}'",
                        work_order.category, work_order.title
                    ),
                )
                .with_property(work_order.property_id),
            );
            deps.notify_manager(
                work_order.property_id,
                "Work order needs a vendor",
                &format!("'{}' could not be auto-assigned", work_order.title),
                NotificationKind::Escalation,
                Some(EntityRef::new("work_order", work_order.id)),
            )?;
            Ok(Outcome::Escalated(format!(
                "no eligible vendor for work order {}",
                work_order.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fixture;
    use chrono::Utc;
    use ct_domain::compliance::PmSchedule;
    use ct_domain::repo::{PmScheduleRepo, WorkOrderRepo};
    use ct_domain::property::Incident;
    use ct_domain::work_order::WorkOrderCategory;
    use ct_ledger::{RunStatus, TriggerType};

    fn pm_schedule(f: &crate::testutil::Fixture) -> PmSchedule {
        let schedule = PmSchedule {
            id: Uuid::new_v4(),
            property_id: f.property_id,
            title: "Quarterly HVAC service".to_string(),
            category: WorkOrderCategory::Hvac,
            frequency_days: 90,
            next_due_at: f.deps.clock.now(),
            active: true,
        };
        f.platform.pm_schedules.add(schedule.clone());
        schedule
    }

    #[test]
    fn pm_due_creates_assigns_and_advances() {
        let f = fixture();
        let schedule = pm_schedule(&f);
        let vendor = f.add_vendor("CoolAir", 4.5, &[WorkOrderCategory::Hvac]);
        let run_id = f.queued_run(TriggerType::PmDue, "pm-1");

        run_maintenance(
            &f.deps,
            &MaintenanceTrigger {
                run_id,
                kind: MaintenanceTriggerKind::PmDue {
                    schedule_id: schedule.id,
                },
            },
        )
        .unwrap();

        assert_eq!(f.run(run_id).status, RunStatus::Completed);
        assert!(f.exceptions(run_id).is_empty());

        let orders = f.platform.work_orders.all();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].assigned_vendor_id, Some(vendor.id));
        assert_eq!(orders[0].status, WorkOrderStatus::Assigned);

        let stored = f.platform.pm_schedules.get(schedule.id).unwrap().unwrap();
        assert_eq!(
            stored.next_due_at,
            schedule.next_due_at + Duration::days(90)
        );

        // The successful assignment becomes the remembered preference.
        assert_eq!(
            f.deps
                .memory
                .preferred_vendor(f.property_id, WorkOrderCategory::Hvac)
                .unwrap(),
            Some(vendor.id)
        );
    }

    #[test]
    fn pm_due_reuses_open_work_order() {
        let f = fixture();
        let schedule = pm_schedule(&f);
        f.add_vendor("CoolAir", 4.5, &[WorkOrderCategory::Hvac]);

        let existing = WorkOrder::new(
            f.property_id,
            "Quarterly HVAC service",
            "",
            WorkOrderCategory::Hvac,
            WorkOrderPriority::Medium,
            Utc::now(),
        );
        f.platform.work_orders.add(existing);

        let run_id = f.queued_run(TriggerType::PmDue, "pm-2");
        run_maintenance(
            &f.deps,
            &MaintenanceTrigger {
                run_id,
                kind: MaintenanceTriggerKind::PmDue {
                    schedule_id: schedule.id,
                },
            },
        )
        .unwrap();

        // No duplicate created.
        assert_eq!(f.platform.work_orders.all().len(), 1);
        assert_eq!(f.run(run_id).status, RunStatus::Completed);
    }

    #[test]
    fn preferred_vendor_wins_over_higher_score() {
        let f = fixture();
        let schedule = pm_schedule(&f);
        let _star = f.add_vendor("Star HVAC", 5.0, &[WorkOrderCategory::Hvac]);
        let preferred = f.add_vendor("Old Reliable", 3.0, &[WorkOrderCategory::Hvac]);
        f.deps
            .memory
            .set_preferred_vendor(f.property_id, WorkOrderCategory::Hvac, preferred.id)
            .unwrap();

        let run_id = f.queued_run(TriggerType::PmDue, "pm-3");
        run_maintenance(
            &f.deps,
            &MaintenanceTrigger {
                run_id,
                kind: MaintenanceTriggerKind::PmDue {
                    schedule_id: schedule.id,
                },
            },
        )
        .unwrap();

        let orders = f.platform.work_orders.all();
        assert_eq!(orders[0].assigned_vendor_id, Some(preferred.id));
    }

    #[test]
    fn vendor_at_capacity_is_skipped() {
        let f = fixture();
        let schedule = pm_schedule(&f);
        let busy = f.add_vendor("Busy HVAC", 5.0, &[WorkOrderCategory::Hvac]);
        let free = f.add_vendor("Free HVAC", 3.0, &[WorkOrderCategory::Hvac]);

        // Default cap is 5 open orders.
        for i in 0..5 {
            let mut wo = WorkOrder::new(
                f.property_id,
                format!("Job {}", i),
                "",
                WorkOrderCategory::Hvac,
                WorkOrderPriority::Medium,
                Utc::now(),
            );
            wo.assigned_vendor_id = Some(busy.id);
            wo.status = WorkOrderStatus::Assigned;
            f.platform.work_orders.add(wo);
        }

        let run_id = f.queued_run(TriggerType::PmDue, "pm-4");
        run_maintenance(
            &f.deps,
            &MaintenanceTrigger {
                run_id,
                kind: MaintenanceTriggerKind::PmDue {
                    schedule_id: schedule.id,
                },
            },
        )
        .unwrap();

        let assigned = f
            .platform
            .work_orders
            .open_with_title(f.property_id, "Quarterly HVAC service")
            .unwrap()
            .unwrap();
        assert_eq!(assigned.assigned_vendor_id, Some(free.id));
    }

    #[test]
    fn high_incident_without_vendors_escalates_with_sla_exception() {
        let f = fixture();
        let incident = Incident {
            id: Uuid::new_v4(),
            property_id: f.property_id,
            severity: IncidentSeverity::High,
            category: WorkOrderCategory::Plumbing,
            description: "Water heater leaking".to_string(),
            reported_at: Utc::now(),
        };
        f.platform.incidents.add(incident.clone());

        let run_id = f.queued_run(TriggerType::NewIncident, "inc-1");
        run_maintenance(
            &f.deps,
            &MaintenanceTrigger {
                run_id,
                kind: MaintenanceTriggerKind::NewIncident {
                    incident_id: incident.id,
                },
            },
        )
        .unwrap();

        assert_eq!(f.run(run_id).status, RunStatus::Escalated);
        let exceptions = f.exceptions(run_id);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].category, ExceptionCategory::Sla);
        // The work order was still created; only assignment failed.
        assert_eq!(f.platform.work_orders.all().len(), 1);
    }

    #[test]
    fn critical_incident_bypasses_policy_and_creates_no_work_order() {
        let f = fixture();
        f.add_vendor("Acme", 5.0, &[WorkOrderCategory::Plumbing]);
        let incident = Incident {
            id: Uuid::new_v4(),
            property_id: f.property_id,
            severity: IncidentSeverity::Critical,
            category: WorkOrderCategory::Plumbing,
            description: "Burst main, flooding lobby".to_string(),
            reported_at: Utc::now(),
        };
        f.platform.incidents.add(incident.clone());

        let run_id = f.queued_run(TriggerType::NewIncident, "inc-2");
        run_maintenance(
            &f.deps,
            &MaintenanceTrigger {
                run_id,
                kind: MaintenanceTriggerKind::NewIncident {
                    incident_id: incident.id,
                },
            },
        )
        .unwrap();

        assert_eq!(f.run(run_id).status, RunStatus::Escalated);
        let exceptions = f.exceptions(run_id);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].severity, Severity::Critical);
        assert_eq!(exceptions[0].category, ExceptionCategory::Safety);
        assert!(f.platform.work_orders.all().is_empty());
    }

    #[test]
    fn already_assigned_work_order_completes_without_action() {
        let f = fixture();
        let mut wo = WorkOrder::new(
            f.property_id,
            "Fix door",
            "",
            WorkOrderCategory::General,
            WorkOrderPriority::Low,
            Utc::now(),
        );
        wo.assigned_vendor_id = Some(Uuid::new_v4());
        wo.status = WorkOrderStatus::Assigned;
        f.platform.work_orders.add(wo.clone());

        let run_id = f.queued_run(TriggerType::UnassignedWorkOrder, "wo-1");
        run_maintenance(
            &f.deps,
            &MaintenanceTrigger {
                run_id,
                kind: MaintenanceTriggerKind::UnassignedWorkOrder {
                    work_order_id: wo.id,
                },
            },
        )
        .unwrap();

        assert_eq!(f.run(run_id).status, RunStatus::Completed);
        assert!(f.exceptions(run_id).is_empty());
    }

    #[test]
    fn missing_schedule_fails_the_run() {
        let f = fixture();
        let run_id = f.queued_run(TriggerType::PmDue, "pm-missing");
        run_maintenance(
            &f.deps,
            &MaintenanceTrigger {
                run_id,
                kind: MaintenanceTriggerKind::PmDue {
                    schedule_id: Uuid::new_v4(),
                },
            },
        )
        .unwrap();

        let run = f.run(run_id);
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.unwrap().contains("not found"));
        // No exception: NotFound is a fault, not an escalation.
        assert!(f.exceptions(run_id).is_empty());

        // The failed step is closed.
        let steps = f.deps.ledger.steps_for_run(run_id).unwrap();
        assert!(steps.iter().all(|s| s.status.is_terminal()));
    }
}
