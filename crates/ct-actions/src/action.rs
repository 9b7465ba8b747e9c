// action.rs — AgentAction: a proposed or executed side effect.
//
// The payload is a tagged union keyed by action type, each variant carrying
// exactly the strongly typed fields its validator and executor need. There is
// no loose JSON payload anywhere in this path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use ct_domain::work_order::{WorkOrderCategory, WorkOrderPriority};
use ct_ledger::Severity;

/// The governed action types and their payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKind {
    AssignVendor {
        work_order_id: Uuid,
        vendor_id: Uuid,
    },
    CreateWorkOrder {
        property_id: Uuid,
        title: String,
        description: String,
        category: WorkOrderCategory,
        priority: WorkOrderPriority,
    },
    RequestBids {
        work_order_id: Uuid,
        vendor_ids: Vec<Uuid>,
    },
    /// Accept a submitted bid. Commits spend; the heaviest policy gate.
    AcceptBid { bid_id: Uuid },
    SendMessage {
        thread_id: Uuid,
        body: String,
    },
    CreateComplianceTask { compliance_item_id: Uuid },
    Escalate {
        property_id: Uuid,
        summary: String,
        severity: Severity,
    },
}

impl ActionKind {
    /// Stable name for logs and allow-lists.
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::AssignVendor { .. } => "assign_vendor",
            ActionKind::CreateWorkOrder { .. } => "create_work_order",
            ActionKind::RequestBids { .. } => "request_bids",
            ActionKind::AcceptBid { .. } => "accept_bid",
            ActionKind::SendMessage { .. } => "send_message",
            ActionKind::CreateComplianceTask { .. } => "create_compliance_task",
            ActionKind::Escalate { .. } => "escalate",
        }
    }
}

/// Execution status of an agent action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Created but not (yet) executed; a human must sign off.
    PendingApproval,
    /// Executed automatically under an Allow verdict.
    AutoExecuted,
    Failed,
}

/// A proposed or executed side effect, created before execution is attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    pub id: Uuid,
    /// The manager on whose behalf the agent acts. Ownership checks compare
    /// every referenced entity against this actor's properties.
    pub actor_id: Uuid,
    pub kind: ActionKind,
    pub status: ActionStatus,
    /// Why the agent proposed this, in its own words.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Outcome detail or failure reason, set after execution is attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentAction {
    /// Create a new action in PendingApproval. The executor flips the status
    /// only after the policy gate allows automatic execution.
    pub fn new(actor_id: Uuid, kind: ActionKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            actor_id,
            kind,
            status: ActionStatus::PendingApproval,
            reasoning: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_action_is_pending_approval() {
        let action = AgentAction::new(
            Uuid::new_v4(),
            ActionKind::AcceptBid {
                bid_id: Uuid::new_v4(),
            },
        );
        assert_eq!(action.status, ActionStatus::PendingApproval);
        assert!(action.result.is_none());
    }

    #[test]
    fn kind_serializes_with_action_tag() {
        let kind = ActionKind::AssignVendor {
            work_order_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["action"], "assign_vendor");
        assert!(json["work_order_id"].is_string());
    }

    #[test]
    fn names_are_stable() {
        let kind = ActionKind::SendMessage {
            thread_id: Uuid::new_v4(),
            body: "hi".to_string(),
        };
        assert_eq!(kind.name(), "send_message");
    }
}
