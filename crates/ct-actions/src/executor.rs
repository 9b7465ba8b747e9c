// executor.rs — Policy-gated execution of agent actions.
//
// `execute` is the single funnel every side effect passes through:
//
//   actor gate → ownership scope → policy (with re-derived live context)
//     → dispatch → notify → audit
//
// It never panics and never propagates an error across the workflow
// boundary — every path returns an ExecutionOutcome. The policy context is
// re-derived at execution time (a vendor's open-order count, a bid's quoted
// amount, the clock) rather than trusted from the proposal, so a stale or
// hostile proposal cannot smuggle an action past the policy.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use ct_domain::collab::{Clock, EntityRef, Notifier, NotificationKind};
use ct_domain::compliance::ComplianceStatus;
use ct_domain::messaging::{MessageIntent, MessageSender, ThreadMessage};
use ct_domain::repo::Repos;
use ct_domain::work_order::{Bid, BidStatus, WorkOrder, WorkOrderPriority, WorkOrderStatus};
use ct_ledger::{ActionKind as LogKind, ActionRecord, Exception, ExceptionCategory, RunLedger};
use ct_policy::{evaluate, has_legal_keywords, minute_of_day, Decision, PolicyRequest, PolicyStore, PolicyVerdict};

use crate::action::{ActionKind, ActionStatus, AgentAction};
use crate::error::ActionError;
use crate::validator::validate_scope;

/// What happened when execution was attempted.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The side effect was performed. `detail` is a one-line summary.
    Completed { detail: String },
    /// Nothing was changed. The error says why.
    Rejected { error: ActionError },
}

impl ExecutionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed { .. })
    }
}

pub struct ActionExecutor {
    repos: Repos,
    policies: Arc<PolicyStore>,
    ledger: Arc<RunLedger>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl ActionExecutor {
    pub fn new(
        repos: Repos,
        policies: Arc<PolicyStore>,
        ledger: Arc<RunLedger>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            policies,
            ledger,
            notifier,
            clock,
        }
    }

    /// Re-derive the live policy context for an action and evaluate it.
    ///
    /// The context always comes from persistence and the clock at call time,
    /// never from the proposal payload.
    pub fn policy_decision_for(&self, kind: &ActionKind) -> Result<PolicyVerdict, ActionError> {
        let (request, property_id) = match kind {
            ActionKind::AssignVendor {
                work_order_id,
                vendor_id,
            } => {
                let work_order = self.work_order(*work_order_id)?;
                let open = self.repos.work_orders.open_count_for_vendor(*vendor_id)?;
                (
                    PolicyRequest::AssignVendor {
                        priority: work_order.priority,
                        category: work_order.category,
                        vendor_open_orders: open,
                    },
                    work_order.property_id,
                )
            }

            ActionKind::CreateWorkOrder {
                property_id,
                priority,
                ..
            } => (
                PolicyRequest::CreateWorkOrder {
                    priority: *priority,
                },
                *property_id,
            ),

            ActionKind::RequestBids { work_order_id, .. } => {
                let work_order = self.work_order(*work_order_id)?;
                (PolicyRequest::RequestBids, work_order.property_id)
            }

            ActionKind::AcceptBid { bid_id } => {
                let bid = self.bid(*bid_id)?;
                let work_order = self.work_order(bid.work_order_id)?;
                (
                    PolicyRequest::SpendApprove { amount: bid.amount },
                    work_order.property_id,
                )
            }

            ActionKind::SendMessage { thread_id, body } => {
                let thread = self.thread(*thread_id)?;
                // No classifier on this path, so the intent is Other — which
                // the whitelist never allows. Proposed messages always reach
                // a human unless the legal scan blocks them outright.
                (
                    PolicyRequest::SendMessage {
                        intent: MessageIntent::Other,
                        has_legal_keywords: has_legal_keywords(body),
                        minute_of_day: minute_of_day(&self.clock.now()),
                    },
                    thread.property_id,
                )
            }

            ActionKind::CreateComplianceTask { compliance_item_id } => {
                let item = self.compliance_item(*compliance_item_id)?;
                let overdue = item.status == ComplianceStatus::Overdue
                    || item.due_at < self.clock.now();
                (
                    PolicyRequest::CreateComplianceTask { overdue },
                    item.property_id,
                )
            }

            ActionKind::Escalate { property_id, .. } => (PolicyRequest::Escalate, *property_id),
        };

        let policy = self.policies.effective_policy(property_id);
        Ok(evaluate(&request, &policy))
    }

    /// Run the full gate sequence and, on Allow, perform the side effect.
    ///
    /// Mutates the action's status and result in place. A policy Approval
    /// leaves the action PendingApproval; every other rejection marks it
    /// Failed.
    pub fn execute(
        &self,
        action: &mut AgentAction,
        actor_id: Uuid,
        run_id: Option<Uuid>,
    ) -> ExecutionOutcome {
        match self.try_execute(action, actor_id, run_id) {
            Ok(detail) => {
                action.status = ActionStatus::AutoExecuted;
                action.result = Some(json!({ "detail": detail }));
                action.updated_at = self.clock.now();
                ExecutionOutcome::Completed { detail }
            }
            Err(error) => {
                if !matches!(error, ActionError::PolicyRequiresApproval { .. }) {
                    action.status = ActionStatus::Failed;
                }
                action.result = Some(json!({ "error": error.to_string() }));
                action.updated_at = self.clock.now();
                ExecutionOutcome::Rejected { error }
            }
        }
    }

    fn try_execute(
        &self,
        action: &AgentAction,
        actor_id: Uuid,
        run_id: Option<Uuid>,
    ) -> Result<String, ActionError> {
        if action.actor_id != actor_id {
            return Err(ActionError::Forbidden(
                "action belongs to a different actor".to_string(),
            ));
        }

        validate_scope(&action.kind, actor_id, &self.repos)?;

        let verdict = self.policy_decision_for(&action.kind)?;
        self.audit(
            ActionRecord::new(
                LogKind::Decision,
                format!("policy evaluated for {}", action.kind.name()),
            )
            .with_policy(verdict.decision.to_string(), verdict.reason.clone()),
            run_id,
        );
        match verdict.decision {
            Decision::Allow => {}
            Decision::Approval => {
                return Err(ActionError::PolicyRequiresApproval {
                    reason: verdict.reason,
                })
            }
            Decision::Block => {
                return Err(ActionError::PolicyBlocked {
                    reason: verdict.reason,
                })
            }
        }

        let detail = self.dispatch(&action.kind, actor_id, run_id)?;

        self.audit(
            ActionRecord::new(LogKind::ApiCall, detail.clone())
                .with_payload(&serde_json::to_value(&action.kind).unwrap_or_default()),
            run_id,
        );
        Ok(detail)
    }

    /// Perform the side effect for one action kind. Only reached on Allow.
    fn dispatch(
        &self,
        kind: &ActionKind,
        actor_id: Uuid,
        run_id: Option<Uuid>,
    ) -> Result<String, ActionError> {
        let now = self.clock.now();
        match kind {
            ActionKind::AssignVendor {
                work_order_id,
                vendor_id,
            } => {
                let mut work_order = self.work_order(*work_order_id)?;
                if work_order.status.is_terminal() {
                    return Err(ActionError::InvalidState(format!(
                        "work order {} is already closed",
                        work_order_id
                    )));
                }
                work_order.assigned_vendor_id = Some(*vendor_id);
                if work_order.status == WorkOrderStatus::New {
                    work_order.status = WorkOrderStatus::Assigned;
                }
                work_order.updated_at = now;
                self.repos.work_orders.update(&work_order)?;
                self.notifier.deliver(
                    actor_id,
                    "Vendor assigned",
                    &format!("'{}' was assigned to a vendor", work_order.title),
                    NotificationKind::WorkOrder,
                    Some(EntityRef::new("work_order", work_order.id)),
                );
                Ok(format!(
                    "assigned vendor {} to work order {}",
                    vendor_id, work_order_id
                ))
            }

            ActionKind::CreateWorkOrder {
                property_id,
                title,
                description,
                category,
                priority,
            } => {
                let work_order =
                    WorkOrder::new(*property_id, title, description, *category, *priority, now);
                self.repos.work_orders.insert(&work_order)?;
                self.notifier.deliver(
                    actor_id,
                    "Work order created",
                    &format!("'{}' was created", title),
                    NotificationKind::WorkOrder,
                    Some(EntityRef::new("work_order", work_order.id)),
                );
                Ok(format!("created work order {}", work_order.id))
            }

            ActionKind::RequestBids {
                work_order_id,
                vendor_ids,
            } => {
                let existing = self.repos.bids.for_work_order(*work_order_id)?;
                let mut requested = 0u32;
                let mut skipped = 0u32;
                for vendor_id in vendor_ids {
                    // A vendor with a request already outstanding is skipped,
                    // so re-running the action cannot double-request.
                    let pending = existing
                        .iter()
                        .any(|b| b.vendor_id == *vendor_id && b.status == BidStatus::Pending);
                    if pending {
                        skipped += 1;
                        continue;
                    }
                    let bid = Bid {
                        id: Uuid::new_v4(),
                        work_order_id: *work_order_id,
                        vendor_id: *vendor_id,
                        amount: 0.0,
                        status: BidStatus::Pending,
                        created_at: now,
                        updated_at: now,
                    };
                    self.repos.bids.insert(&bid)?;
                    requested += 1;
                }
                Ok(format!(
                    "requested bids from {} vendors ({} already pending)",
                    requested, skipped
                ))
            }

            ActionKind::AcceptBid { bid_id } => {
                let mut bid = self.bid(*bid_id)?;
                if bid.status != BidStatus::Submitted {
                    return Err(ActionError::InvalidState(format!(
                        "bid {} is {:?}; only submitted bids can be accepted",
                        bid_id, bid.status
                    )));
                }
                bid.status = BidStatus::Accepted;
                bid.updated_at = now;
                self.repos.bids.update(&bid)?;

                // Losing bids are closed out and the vendor gets the work.
                for mut other in self.repos.bids.for_work_order(bid.work_order_id)? {
                    if other.id != bid.id
                        && matches!(other.status, BidStatus::Pending | BidStatus::Submitted)
                    {
                        other.status = BidStatus::Rejected;
                        other.updated_at = now;
                        self.repos.bids.update(&other)?;
                    }
                }
                let mut work_order = self.work_order(bid.work_order_id)?;
                work_order.assigned_vendor_id = Some(bid.vendor_id);
                if work_order.status == WorkOrderStatus::New {
                    work_order.status = WorkOrderStatus::Assigned;
                }
                work_order.updated_at = now;
                self.repos.work_orders.update(&work_order)?;

                self.notifier.deliver(
                    actor_id,
                    "Bid accepted",
                    &format!("Bid of {:.2} accepted for '{}'", bid.amount, work_order.title),
                    NotificationKind::WorkOrder,
                    Some(EntityRef::new("work_order", work_order.id)),
                );
                Ok(format!("accepted bid {} ({:.2})", bid_id, bid.amount))
            }

            ActionKind::SendMessage { thread_id, body } => {
                let mut thread = self.thread(*thread_id)?;
                thread.messages.push(ThreadMessage {
                    id: Uuid::new_v4(),
                    sender: MessageSender::Agent,
                    body: body.clone(),
                    sent_at: now,
                });
                self.repos.messages.update_thread(&thread)?;
                self.notifier.deliver(
                    thread.tenant_id,
                    "New message",
                    body,
                    NotificationKind::Message,
                    Some(EntityRef::new("message_thread", thread.id)),
                );
                Ok(format!("posted reply to thread {}", thread_id))
            }

            ActionKind::CreateComplianceTask { compliance_item_id } => {
                let mut item = self.compliance_item(*compliance_item_id)?;
                if !matches!(
                    item.status,
                    ComplianceStatus::Pending | ComplianceStatus::Overdue
                ) {
                    return Err(ActionError::InvalidState(format!(
                        "compliance item {} is not open",
                        compliance_item_id
                    )));
                }
                let priority = if item.status == ComplianceStatus::Overdue {
                    WorkOrderPriority::Emergency
                } else {
                    WorkOrderPriority::High
                };
                let work_order = WorkOrder::new(
                    item.property_id,
                    &item.title,
                    format!("Compliance remediation: {}", item.title),
                    item.category.work_order_category(),
                    priority,
                    now,
                );
                self.repos.work_orders.insert(&work_order)?;
                item.status = ComplianceStatus::InProgress;
                self.repos.compliance.update(&item)?;
                self.notifier.deliver(
                    actor_id,
                    "Compliance task created",
                    &format!("Remediation work created for '{}'", item.title),
                    NotificationKind::Compliance,
                    Some(EntityRef::new("work_order", work_order.id)),
                );
                Ok(format!(
                    "created compliance work order {} for item {}",
                    work_order.id, compliance_item_id
                ))
            }

            ActionKind::Escalate {
                property_id,
                summary,
                severity,
            } => {
                let mut exception = Exception::new(
                    *severity,
                    ExceptionCategory::System,
                    "Agent escalation",
                    summary,
                )
                .with_property(*property_id);
                if let Some(run_id) = run_id {
                    exception = exception.with_run(run_id);
                }
                let id = self.ledger.create_exception(&exception);
                self.notifier.deliver(
                    actor_id,
                    "Agent escalation",
                    summary,
                    NotificationKind::Escalation,
                    Some(EntityRef::new("exception", id)),
                );
                Ok(format!("raised exception {}", id))
            }
        }
    }

    /// Best-effort audit append; a telemetry failure never fails the action.
    fn audit(&self, record: ActionRecord, run_id: Option<Uuid>) {
        let record = match run_id {
            Some(id) => record.with_run(id),
            None => record,
        };
        if let Err(e) = self.ledger.log_action(record) {
            tracing::warn!("failed to append action record: {}", e);
        }
    }

    fn work_order(&self, id: Uuid) -> Result<WorkOrder, ActionError> {
        self.repos
            .work_orders
            .get(id)?
            .ok_or(ActionError::NotFound {
                entity: "work order",
                id,
            })
    }

    fn bid(&self, id: Uuid) -> Result<Bid, ActionError> {
        self.repos.bids.get(id)?.ok_or(ActionError::NotFound {
            entity: "bid",
            id,
        })
    }

    fn thread(&self, id: Uuid) -> Result<ct_domain::messaging::MessageThread, ActionError> {
        self.repos
            .messages
            .get_thread(id)?
            .ok_or(ActionError::NotFound {
                entity: "message thread",
                id,
            })
    }

    fn compliance_item(
        &self,
        id: Uuid,
    ) -> Result<ct_domain::compliance::ComplianceItem, ActionError> {
        self.repos
            .compliance
            .get(id)?
            .ok_or(ActionError::NotFound {
                entity: "compliance item",
                id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ct_domain::collab::{RecordingNotifier, SystemClock};
    use ct_domain::memrepo::InMemoryPlatform;
    use ct_domain::property::Property;
    use ct_domain::repo::{BidRepo, MessageRepo, WorkOrderRepo};
    use ct_domain::vendor::Vendor;
    use ct_domain::work_order::WorkOrderCategory;
    use ct_ledger::Severity;
    use tempfile::tempdir;

    struct Fixture {
        platform: InMemoryPlatform,
        executor: ActionExecutor,
        notifier: Arc<RecordingNotifier>,
        ledger: Arc<RunLedger>,
        manager: Uuid,
        property_id: Uuid,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let platform = InMemoryPlatform::new();
        let manager = Uuid::new_v4();
        let property = Property {
            id: Uuid::new_v4(),
            manager_id: manager,
            name: "12 Elm St".to_string(),
            address: "12 Elm St".to_string(),
        };
        let property_id = property.id;
        platform.properties.add(property);

        let ledger = Arc::new(RunLedger::open(dir.path()).unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        let executor = ActionExecutor::new(
            platform.repos(),
            Arc::new(PolicyStore::new()),
            ledger.clone(),
            notifier.clone(),
            Arc::new(SystemClock),
        );
        Fixture {
            platform,
            executor,
            notifier,
            ledger,
            manager,
            property_id,
            _dir: dir,
        }
    }

    fn seed_work_order(f: &Fixture, priority: WorkOrderPriority) -> WorkOrder {
        let wo = WorkOrder::new(
            f.property_id,
            "Fix leak",
            "Unit 4B",
            WorkOrderCategory::Plumbing,
            priority,
            Utc::now(),
        );
        f.platform.work_orders.add(wo.clone());
        wo
    }

    fn seed_vendor(f: &Fixture) -> Vendor {
        let vendor = Vendor {
            id: Uuid::new_v4(),
            name: "Acme Plumbing".to_string(),
            active: true,
            performance_score: 4.5,
            categories: vec![WorkOrderCategory::Plumbing],
            license_expires_at: Some(Utc::now() + chrono::Duration::days(90)),
            insurance_valid: true,
        };
        f.platform.vendors.add(vendor.clone());
        f.platform.vendors.link(vendor.id, f.property_id);
        vendor
    }

    fn seed_bid(f: &Fixture, work_order_id: Uuid, amount: f64, status: BidStatus) -> Bid {
        let bid = Bid {
            id: Uuid::new_v4(),
            work_order_id,
            vendor_id: seed_vendor(f).id,
            amount,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        f.platform.bids.add(bid.clone());
        bid
    }

    #[test]
    fn accept_bid_within_limit_auto_executes() {
        let f = fixture();
        let wo = seed_work_order(&f, WorkOrderPriority::Medium);
        let bid = seed_bid(&f, wo.id, 420.0, BidStatus::Submitted);

        let mut action = AgentAction::new(f.manager, ActionKind::AcceptBid { bid_id: bid.id });
        let outcome = f.executor.execute(&mut action, f.manager, None);

        assert!(outcome.is_completed());
        assert_eq!(action.status, ActionStatus::AutoExecuted);

        let stored = f.platform.bids.get(bid.id).unwrap().unwrap();
        assert_eq!(stored.status, BidStatus::Accepted);
        let stored_wo = f.platform.work_orders.get(wo.id).unwrap().unwrap();
        assert_eq!(stored_wo.assigned_vendor_id, Some(bid.vendor_id));
        assert_eq!(stored_wo.status, WorkOrderStatus::Assigned);

        // One decision record, one api-call record.
        let actions = f.ledger.read_actions().unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].policy_decision.as_deref(), Some("allow"));
        assert!(f.notifier.deliveries().iter().any(|n| n.title == "Bid accepted"));
    }

    #[test]
    fn accept_bid_above_limit_stays_pending() {
        let f = fixture();
        let wo = seed_work_order(&f, WorkOrderPriority::Medium);
        let bid = seed_bid(&f, wo.id, 900.0, BidStatus::Submitted);

        let mut action = AgentAction::new(f.manager, ActionKind::AcceptBid { bid_id: bid.id });
        let outcome = f.executor.execute(&mut action, f.manager, None);

        match outcome {
            ExecutionOutcome::Rejected {
                error: ActionError::PolicyRequiresApproval { reason },
            } => assert!(reason.contains("auto-approve")),
            other => panic!("expected approval rejection, got {:?}", other),
        }
        // Approval is not a failure: the action waits for a human.
        assert_eq!(action.status, ActionStatus::PendingApproval);
        let stored = f.platform.bids.get(bid.id).unwrap().unwrap();
        assert_eq!(stored.status, BidStatus::Submitted);
    }

    #[test]
    fn accept_bid_requires_submitted_status() {
        let f = fixture();
        let wo = seed_work_order(&f, WorkOrderPriority::Medium);
        let bid = seed_bid(&f, wo.id, 100.0, BidStatus::Pending);

        let mut action = AgentAction::new(f.manager, ActionKind::AcceptBid { bid_id: bid.id });
        let outcome = f.executor.execute(&mut action, f.manager, None);

        assert!(matches!(
            outcome,
            ExecutionOutcome::Rejected {
                error: ActionError::InvalidState(_)
            }
        ));
        assert_eq!(action.status, ActionStatus::Failed);
    }

    #[test]
    fn accepting_one_bid_rejects_the_others() {
        let f = fixture();
        let wo = seed_work_order(&f, WorkOrderPriority::Medium);
        let winner = seed_bid(&f, wo.id, 300.0, BidStatus::Submitted);
        let loser = seed_bid(&f, wo.id, 350.0, BidStatus::Submitted);

        let mut action = AgentAction::new(f.manager, ActionKind::AcceptBid { bid_id: winner.id });
        assert!(f.executor.execute(&mut action, f.manager, None).is_completed());

        assert_eq!(
            f.platform.bids.get(loser.id).unwrap().unwrap().status,
            BidStatus::Rejected
        );
    }

    #[test]
    fn wrong_actor_is_forbidden() {
        let f = fixture();
        let wo = seed_work_order(&f, WorkOrderPriority::Medium);
        let vendor = seed_vendor(&f);

        let mut action = AgentAction::new(
            f.manager,
            ActionKind::AssignVendor {
                work_order_id: wo.id,
                vendor_id: vendor.id,
            },
        );
        let outcome = f.executor.execute(&mut action, Uuid::new_v4(), None);
        assert!(matches!(
            outcome,
            ExecutionOutcome::Rejected {
                error: ActionError::Forbidden(_)
            }
        ));
        // Nothing changed.
        assert!(f
            .platform
            .work_orders
            .get(wo.id)
            .unwrap()
            .unwrap()
            .assigned_vendor_id
            .is_none());
    }

    #[test]
    fn emergency_work_order_is_blocked() {
        let f = fixture();
        let mut action = AgentAction::new(
            f.manager,
            ActionKind::CreateWorkOrder {
                property_id: f.property_id,
                title: "Gas leak".to_string(),
                description: String::new(),
                category: WorkOrderCategory::Plumbing,
                priority: WorkOrderPriority::Emergency,
            },
        );
        let outcome = f.executor.execute(&mut action, f.manager, None);
        assert!(matches!(
            outcome,
            ExecutionOutcome::Rejected {
                error: ActionError::PolicyBlocked { .. }
            }
        ));
        assert_eq!(action.status, ActionStatus::Failed);
        assert!(f.platform.work_orders.all().is_empty());
    }

    #[test]
    fn request_bids_skips_vendors_with_pending_requests() {
        let f = fixture();
        let wo = seed_work_order(&f, WorkOrderPriority::Medium);
        let already_asked = seed_bid(&f, wo.id, 0.0, BidStatus::Pending);
        let fresh_vendor = seed_vendor(&f);

        let mut action = AgentAction::new(
            f.manager,
            ActionKind::RequestBids {
                work_order_id: wo.id,
                vendor_ids: vec![already_asked.vendor_id, fresh_vendor.id],
            },
        );
        let outcome = f.executor.execute(&mut action, f.manager, None);
        match outcome {
            ExecutionOutcome::Completed { detail } => {
                assert!(detail.contains("1 vendors (1 already pending)"));
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(f.platform.bids.for_work_order(wo.id).unwrap().len(), 2);
    }

    #[test]
    fn proposed_message_always_reaches_a_human() {
        let f = fixture();
        let thread = ct_domain::messaging::MessageThread {
            id: Uuid::new_v4(),
            property_id: f.property_id,
            tenant_id: Uuid::new_v4(),
            status: ct_domain::messaging::ThreadStatus::Open,
            messages: vec![],
        };
        f.platform.messages.add(thread.clone());

        let mut action = AgentAction::new(
            f.manager,
            ActionKind::SendMessage {
                thread_id: thread.id,
                body: "Your request was received".to_string(),
            },
        );
        let outcome = f.executor.execute(&mut action, f.manager, None);
        assert!(matches!(
            outcome,
            ExecutionOutcome::Rejected {
                error: ActionError::PolicyRequiresApproval { .. }
            }
        ));
        assert_eq!(action.status, ActionStatus::PendingApproval);
        // No message posted.
        assert!(f
            .platform
            .messages
            .get_thread(thread.id)
            .unwrap()
            .unwrap()
            .messages
            .is_empty());
    }

    #[test]
    fn escalate_raises_exception_and_notifies() {
        let f = fixture();
        let run = match f
            .ledger
            .create_run(ct_ledger::TriggerType::AgentSession, "session-1", None)
            .unwrap()
        {
            ct_ledger::CreateRunOutcome::Created(run) => run,
            other => panic!("expected Created, got {:?}", other),
        };

        let mut action = AgentAction::new(
            f.manager,
            ActionKind::Escalate {
                property_id: f.property_id,
                summary: "Two vendors disputing the same invoice".to_string(),
                severity: Severity::High,
            },
        );
        let outcome = f.executor.execute(&mut action, f.manager, Some(run.id));
        assert!(outcome.is_completed());

        let exceptions = f.ledger.exceptions_for_run(run.id).unwrap();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].severity, Severity::High);
        assert!(f
            .notifier
            .deliveries()
            .iter()
            .any(|n| n.kind == NotificationKind::Escalation));
    }
}
