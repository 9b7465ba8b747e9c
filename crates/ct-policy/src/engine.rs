// engine.rs — The deterministic policy engine.
//
// `evaluate()` is a pure function: the same request against the same config
// always yields the same verdict, and every verdict carries a stated reason.
// The checks per action type, in order:
//
// 1. Spend: hard block above the ceiling → approval above the auto cap → allow
// 2. Vendor assignment: emergency block → category whitelist → capacity cap
// 3. Work-order creation: emergency block only
// 4. Bid requests and escalations: always allowed (no spend committed)
// 5. Messages: legal block → intent whitelist → quiet hours
// 6. Compliance tasks: auto-create switch → overdue block
//
// The default for anything unrecognized is Approval, never Allow. An action
// the policy cannot classify goes to a human.

use serde::{Deserialize, Serialize};

use ct_domain::messaging::MessageIntent;
use ct_domain::work_order::{WorkOrderCategory, WorkOrderPriority};

use crate::config::PolicyConfig;
use crate::quiet_hours::in_window;

/// The three possible policy outcomes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Execute automatically.
    Allow,
    /// Queue for human sign-off; the agent prepares but does not act.
    Approval,
    /// Do not act at all; escalate.
    Block,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Allow => write!(f, "allow"),
            Decision::Approval => write!(f, "approval"),
            Decision::Block => write!(f, "block"),
        }
    }
}

/// A decision plus the reason it was reached. The reason is never empty —
/// it is what lands in the action log and on any Exception raised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyVerdict {
    pub decision: Decision,
    pub reason: String,
}

impl PolicyVerdict {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Allow,
            reason: reason.into(),
        }
    }

    fn approval(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Approval,
            reason: reason.into(),
        }
    }

    fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Block,
            reason: reason.into(),
        }
    }
}

/// A request to the policy engine — one variant per governed action type,
/// each carrying exactly the live context its rules need.
///
/// `Other` is the escape hatch for action types the engine does not govern;
/// it always resolves to Approval (fail-safe, never fail-open).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PolicyRequest {
    /// Commit spend (accept a bid, approve an invoice).
    SpendApprove { amount: f64 },

    /// Assign a vendor to a work order.
    AssignVendor {
        priority: WorkOrderPriority,
        category: WorkOrderCategory,
        /// The vendor's current open work-order count.
        vendor_open_orders: u32,
    },

    /// Create a work order.
    CreateWorkOrder { priority: WorkOrderPriority },

    /// Request bids from vendors. Commits no spend.
    RequestBids,

    /// Raise a human-facing escalation. Always permitted.
    Escalate,

    /// Send a message to a tenant.
    SendMessage {
        intent: MessageIntent,
        has_legal_keywords: bool,
        /// Minute-of-day at evaluation time, for the quiet-hours check.
        minute_of_day: u16,
    },

    /// Create a compliance remediation task.
    CreateComplianceTask { overdue: bool },

    /// An action type the engine does not govern.
    Other(String),
}

/// Evaluate one action against a policy. Pure and total: every request gets
/// exactly one verdict with a non-empty reason.
pub fn evaluate(request: &PolicyRequest, policy: &PolicyConfig) -> PolicyVerdict {
    match request {
        PolicyRequest::SpendApprove { amount } => {
            if *amount > policy.spend.hard_block_above {
                PolicyVerdict::block(format!(
                    "amount {:.2} exceeds hard block threshold {:.2}",
                    amount, policy.spend.hard_block_above
                ))
            } else if *amount > policy.spend.auto_approve_max {
                PolicyVerdict::approval(format!(
                    "amount {:.2} exceeds auto-approve limit {:.2}",
                    amount, policy.spend.auto_approve_max
                ))
            } else {
                PolicyVerdict::allow(format!(
                    "amount {:.2} within auto-approve limit {:.2}",
                    amount, policy.spend.auto_approve_max
                ))
            }
        }

        PolicyRequest::AssignVendor {
            priority,
            category,
            vendor_open_orders,
        } => {
            if *priority == WorkOrderPriority::Emergency && policy.work_orders.escalate_emergencies
            {
                return PolicyVerdict::block(
                    "emergency work orders always escalate to a human".to_string(),
                );
            }
            if !policy.work_orders.auto_assign_categories.contains(category) {
                return PolicyVerdict::approval(format!(
                    "category '{}' is not on the auto-assign whitelist",
                    category
                ));
            }
            if *vendor_open_orders >= policy.work_orders.max_open_per_vendor {
                return PolicyVerdict::approval(format!(
                    "vendor has {} open work orders (cap {})",
                    vendor_open_orders, policy.work_orders.max_open_per_vendor
                ));
            }
            PolicyVerdict::allow(format!(
                "category '{}' auto-assignable, vendor under capacity",
                category
            ))
        }

        PolicyRequest::CreateWorkOrder { priority } => {
            if *priority == WorkOrderPriority::Emergency && policy.work_orders.escalate_emergencies
            {
                PolicyVerdict::block("emergency work orders always escalate to a human".to_string())
            } else {
                PolicyVerdict::allow("work-order creation permitted".to_string())
            }
        }

        PolicyRequest::RequestBids => {
            PolicyVerdict::allow("requesting bids commits no spend".to_string())
        }

        PolicyRequest::Escalate => {
            PolicyVerdict::allow("escalating to a human is always permitted".to_string())
        }

        PolicyRequest::SendMessage {
            intent,
            has_legal_keywords,
            minute_of_day,
        } => {
            if *has_legal_keywords && policy.messaging.escalate_legal {
                return PolicyVerdict::block(
                    "message contains legal-risk language".to_string(),
                );
            }
            if !policy.messaging.allowed_auto_intents.contains(intent) {
                return PolicyVerdict::approval(format!(
                    "intent '{}' is not on the auto-reply whitelist",
                    intent
                ));
            }
            if in_window(*minute_of_day, &policy.messaging.quiet_hours) {
                return PolicyVerdict::approval(format!(
                    "inside quiet hours {}–{}",
                    policy.messaging.quiet_hours.start, policy.messaging.quiet_hours.end
                ));
            }
            PolicyVerdict::allow(format!("intent '{}' auto-replyable", intent))
        }

        PolicyRequest::CreateComplianceTask { overdue } => {
            if !policy.compliance.auto_create_tasks {
                return PolicyVerdict::approval(
                    "automatic compliance task creation is disabled".to_string(),
                );
            }
            if *overdue && policy.compliance.escalate_overdue {
                return PolicyVerdict::block(
                    "item is overdue and overdue items always escalate".to_string(),
                );
            }
            PolicyVerdict::allow("compliance task creation permitted".to_string())
        }

        PolicyRequest::Other(name) => PolicyVerdict::approval(format!(
            "action type '{}' is not governed by policy; requires human approval",
            name
        )),
    }
}
