// messaging.rs — Tenant message threads and classified intents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classified intent of an inbound tenant message.
///
/// Only intents on the policy's auto-intent whitelist may be answered
/// automatically; everything else goes to a human.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageIntent {
    MaintenanceIntake,
    Complaint,
    PaymentQuestion,
    GeneralQuestion,
    LeaseQuestion,
    Other,
}

impl std::fmt::Display for MessageIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageIntent::MaintenanceIntake => "maintenance_intake",
            MessageIntent::Complaint => "complaint",
            MessageIntent::PaymentQuestion => "payment_question",
            MessageIntent::GeneralQuestion => "general_question",
            MessageIntent::LeaseQuestion => "lease_question",
            MessageIntent::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Who wrote a message in a thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    Tenant,
    Manager,
    Agent,
}

/// One message in a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: Uuid,
    pub sender: MessageSender,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Status of a message thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Open,
    Closed,
}

/// A conversation between a tenant and the property's management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageThread {
    pub id: Uuid,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    pub status: ThreadStatus,
    pub messages: Vec<ThreadMessage>,
}

impl MessageThread {
    /// The most recent tenant message, if any.
    pub fn last_tenant_message(&self) -> Option<&ThreadMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == MessageSender::Tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_tenant_message_skips_agent_replies() {
        let now = Utc::now();
        let thread = MessageThread {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            status: ThreadStatus::Open,
            messages: vec![
                ThreadMessage {
                    id: Uuid::new_v4(),
                    sender: MessageSender::Tenant,
                    body: "The sink is clogged".to_string(),
                    sent_at: now,
                },
                ThreadMessage {
                    id: Uuid::new_v4(),
                    sender: MessageSender::Agent,
                    body: "We're on it".to_string(),
                    sent_at: now,
                },
            ],
        };
        assert_eq!(
            thread.last_tenant_message().unwrap().body,
            "The sink is clogged"
        );
    }
}
