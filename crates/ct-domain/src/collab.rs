// collab.rs — Collaborator interfaces: reasoning service, notifications, clock.
//
// These traits are the seams to everything outside the core. Workflows never
// call an LLM, an email gateway, or `Utc::now()` directly — they go through
// these interfaces, so every behavior in this workspace is testable with
// stubs and a fixed clock.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::DomainError;
use crate::messaging::MessageIntent;
use crate::work_order::WorkOrderCategory;

/// Result of classifying an inbound tenant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub intent: MessageIntent,
    /// Whether the classifier detected legal-risk language. The comms
    /// workflow ORs this with its own local keyword scan — the local scan is
    /// mandatory and cannot be bypassed by a misbehaving classifier.
    pub has_legal_keywords: bool,
}

/// One tool request from the model during an interactive session.
///
/// `ProposeAction` carries the action payload as raw JSON: the session layer
/// deserializes and gates it, so a malformed or unknown action degrades to a
/// tool error rather than crossing this interface as a typed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    ProposeAction { action: Value, reasoning: String },
    GetBestVendor {
        property_id: Uuid,
        category: WorkOrderCategory,
    },
    DraftMessage {
        context: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tone: Option<String>,
    },
    GetSubmittedBids { work_order_id: Uuid },
}

/// A tool call paired with what it produced, fed back on the next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call: ToolCall,
    pub output: Value,
}

/// What the model did with a session turn.
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    /// The session is over; this is the closing message.
    Final(String),
    /// Run these tools and come back with the results.
    ToolCalls(Vec<ToolCall>),
}

/// The LLM-backed classification and drafting service.
///
/// Implementations must degrade to a safe default on failure (the comms
/// workflow falls back to a local keyword classifier and otherwise treats
/// the message as `MessageIntent::Other`) rather than crash a run.
pub trait ReasoningService: Send + Sync {
    /// Classify a free-text tenant message.
    fn classify(&self, text: &str) -> Result<Classification, DomainError>;

    /// Draft a reply or notice from the given context. `tone` is an optional
    /// style hint (e.g. "empathetic", "formal").
    fn draft(&self, context: &str, tone: Option<&str>) -> Result<String, DomainError>;

    /// One turn of an interactive session: given the standing context and
    /// the results of the previous tool batch, either finish or ask for more
    /// tools. Backends without session support keep the default, which ends
    /// the session immediately.
    fn chat_turn(&self, context: &str, prior: &[ToolResult]) -> Result<ChatOutcome, DomainError> {
        let _ = (context, prior);
        Ok(ChatOutcome::Final(String::new()))
    }
}

/// What kind of notification is being delivered. Receivers use this for
/// routing and display only; the core attaches no semantics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WorkOrder,
    Message,
    Compliance,
    Escalation,
    SlaBreach,
}

/// Reference to the entity a notification is about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity: String,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(entity: impl Into<String>, id: Uuid) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }
}

/// Outbound notification delivery (email/SMS/push behind the platform).
///
/// Fire-and-forget: the core never awaits delivery confirmation and never
/// fails a run because a notification could not be sent. Implementations
/// should log failures and move on; the dispatching side of the core does
/// the same.
pub trait Notifier: Send + Sync {
    fn deliver(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
        kind: NotificationKind,
        entity_ref: Option<EntityRef>,
    );
}

/// A notifier that records deliveries in memory. Used throughout the test
/// suites to assert on notification fan-out.
#[derive(Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<RecordedNotification>>,
}

/// One recorded delivery.
#[derive(Debug, Clone)]
pub struct RecordedNotification {
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub kind: NotificationKind,
    pub entity_ref: Option<EntityRef>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn deliveries(&self) -> Vec<RecordedNotification> {
        self.deliveries.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
        kind: NotificationKind,
        entity_ref: Option<EntityRef>,
    ) {
        self.deliveries
            .lock()
            .expect("notifier lock")
            .push(RecordedNotification {
                user_id,
                title: title.to_string(),
                body: body.to_string(),
                kind,
                entity_ref,
            });
    }
}

/// Time source. Workflows take the clock as a dependency so quiet-hours
/// checks and date bucketing are deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to a new instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock") = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}
