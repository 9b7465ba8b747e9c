// comms.rs — Tenant Comms Autopilot.
//
// Classifies the latest tenant message and either answers it, drafts an
// answer for human review, or refuses to touch it. The legal-keyword scan
// runs locally and is OR-ed with the classifier's flag: a broken or fooled
// classifier can only ever make the outcome more conservative, not less.

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use ct_domain::collab::{Classification, EntityRef, NotificationKind};
use ct_domain::error::DomainError;
use ct_domain::messaging::{MessageIntent, MessageSender, ThreadMessage};
use ct_domain::work_order::{WorkOrder, WorkOrderCategory, WorkOrderPriority};
use ct_ledger::{Exception, ExceptionCategory, LedgerError, RunRecorder, Severity};
use ct_policy::{evaluate, has_legal_keywords, minute_of_day, Decision, PolicyRequest};

use crate::deps::{finish, Outcome, WorkflowDeps};
use crate::error::WorkflowError;

/// Deadline given to humans for legally sensitive messages.
const LEGAL_RESPONSE_HOURS: i64 = 4;

/// Vocabulary that marks a message as unambiguous maintenance intake when
/// the classifier is down. Anything not matching stays Other and goes to a
/// human.
const MAINTENANCE_KEYWORDS: &[&str] = &[
    "leak",
    "clog",
    "broken",
    "not working",
    "no heat",
    "no hot water",
    "overflow",
    "repair",
];

/// Last-resort intent guess used when the reasoning service errors.
fn fallback_intent(text: &str) -> MessageIntent {
    let text = text.to_lowercase();
    if MAINTENANCE_KEYWORDS.iter().any(|k| text.contains(k)) {
        MessageIntent::MaintenanceIntake
    } else {
        MessageIntent::Other
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommsTrigger {
    pub run_id: Uuid,
    pub thread_id: Uuid,
}

pub fn run_comms(deps: &WorkflowDeps, trigger: &CommsTrigger) -> Result<(), LedgerError> {
    let mut recorder = RunRecorder::begin(deps.ledger.clone(), trigger.run_id)?;
    let result = execute(deps, trigger.thread_id, &mut recorder);
    finish(recorder, result)
}

fn execute(
    deps: &WorkflowDeps,
    thread_id: Uuid,
    recorder: &mut RunRecorder,
) -> Result<Outcome, WorkflowError> {
    let idx = recorder.step_start("load_thread", json!({ "thread_id": thread_id }))?;
    let mut thread = match deps.repos.messages.get_thread(thread_id)? {
        Some(thread) => thread,
        None => {
            let err = DomainError::not_found("message thread", thread_id);
            recorder.step_failed(idx, &err.to_string())?;
            return Err(err.into());
        }
    };
    let message = match thread.last_tenant_message() {
        Some(message) => message.clone(),
        None => {
            recorder.step_done(idx, json!({ "tenant_message": false }))?;
            return Ok(Outcome::Completed(
                "no tenant message to answer".to_string(),
            ));
        }
    };
    recorder.step_done(idx, json!({ "tenant_message": true }))?;

    // Classify, degrading to the keyword fallback on failure. The local
    // legal scan below still runs either way.
    let idx = recorder.step_start("classify", json!({ "length": message.body.len() }))?;
    let classification = match deps.reasoning.classify(&message.body) {
        Ok(classification) => classification,
        Err(error) => {
            tracing::warn!(thread_id = %thread_id, "classifier failed, using keyword fallback: {}", error);
            Classification {
                intent: fallback_intent(&message.body),
                has_legal_keywords: false,
            }
        }
    };
    let legal = classification.has_legal_keywords || has_legal_keywords(&message.body);
    recorder.step_done(
        idx,
        json!({ "intent": classification.intent, "legal": legal }),
    )?;

    deps.memory
        .update_comms_context(thread.tenant_id, classification.intent, message.sent_at)?;
    recorder.log_memory_write(&format!("comms context for tenant {}", thread.tenant_id));

    let policy = deps.policies.effective_policy(thread.property_id);
    let verdict = evaluate(
        &PolicyRequest::SendMessage {
            intent: classification.intent,
            has_legal_keywords: legal,
            minute_of_day: minute_of_day(&deps.clock.now()),
        },
        &policy,
    );
    recorder.log_decision(
        "auto-reply to tenant message",
        &verdict.decision.to_string(),
        &verdict.reason,
    );

    match verdict.decision {
        Decision::Block => {
            // No reply of any kind; a human owns this conversation now.
            let idx = recorder.step_start("escalate_blocked", json!({}))?;
            recorder.exception(
                Exception::new(
                    Severity::Critical,
                    ExceptionCategory::Legal,
                    "Legally sensitive tenant message",
                    &verdict.reason,
                )
                .with_property(thread.property_id)
                .with_respond_by(deps.clock.now() + Duration::hours(LEGAL_RESPONSE_HOURS)),
            );
            deps.notify_manager(
                thread.property_id,
                "Tenant message needs urgent review",
                &verdict.reason,
                NotificationKind::Escalation,
                Some(EntityRef::new("message_thread", thread.id)),
            )?;
            recorder.step_done(idx, json!({}))?;
            Ok(Outcome::Escalated("message blocked by policy".to_string()))
        }

        Decision::Approval => {
            // Draft the reply but do not send it; attach it for the human.
            let idx = recorder.step_start("draft_for_review", json!({}))?;
            let draft = deps
                .reasoning
                .draft(&message.body, Some("professional"))
                .unwrap_or_default();
            recorder.exception(
                Exception::new(
                    Severity::Medium,
                    ExceptionCategory::System,
                    "Reply drafted, awaiting review",
                    &verdict.reason,
                )
                .with_property(thread.property_id)
                .with_suggested_payload(json!({ "draft": draft })),
            );
            deps.notify_manager(
                thread.property_id,
                "Tenant reply awaiting review",
                &verdict.reason,
                NotificationKind::Message,
                Some(EntityRef::new("message_thread", thread.id)),
            )?;
            recorder.step_done(idx, json!({ "drafted": true }))?;
            Ok(Outcome::Escalated(
                "reply drafted and queued for review".to_string(),
            ))
        }

        Decision::Allow => {
            // Maintenance intake spawns a work order before the reply.
            if classification.intent == MessageIntent::MaintenanceIntake {
                let idx = recorder.step_start("create_work_order", json!({}))?;
                let mut work_order = WorkOrder::new(
                    thread.property_id,
                    "Maintenance request",
                    &message.body,
                    WorkOrderCategory::General,
                    WorkOrderPriority::Medium,
                    deps.clock.now(),
                );
                work_order.tenant_id = Some(thread.tenant_id);
                deps.repos.work_orders.insert(&work_order)?;
                recorder.log_api_call(
                    "created work order from tenant message",
                    &json!({ "work_order_id": work_order.id, "thread_id": thread.id }),
                );
                recorder.step_done(idx, json!({ "work_order_id": work_order.id }))?;
            }

            let idx = recorder.step_start("send_reply", json!({}))?;
            let reply = match deps.reasoning.draft(&message.body, Some("friendly")) {
                Ok(reply) => reply,
                Err(error) => {
                    // Could not produce a reply; hand the thread to a human
                    // rather than leave the tenant hanging.
                    recorder.step_failed(idx, &error.to_string())?;
                    recorder.exception(
                        Exception::new(
                            Severity::Medium,
                            ExceptionCategory::System,
                            "Reply drafting failed",
                            error.to_string(),
                        )
                        .with_property(thread.property_id),
                    );
                    return Ok(Outcome::Escalated("reply drafting failed".to_string()));
                }
            };
            thread.messages.push(ThreadMessage {
                id: Uuid::new_v4(),
                sender: MessageSender::Agent,
                body: reply.clone(),
                sent_at: deps.clock.now(),
            });
            deps.repos.messages.update_thread(&thread)?;
            recorder.log_api_call(
                "posted auto-reply",
                &json!({ "thread_id": thread.id }),
            );
            deps.notifier.deliver(
                thread.tenant_id,
                "New message",
                &reply,
                NotificationKind::Message,
                Some(EntityRef::new("message_thread", thread.id)),
            );
            recorder.step_done(idx, json!({ "sent": true }))?;

            // A complaint gets an answer and a human follow-up.
            if classification.intent == MessageIntent::Complaint {
                recorder.exception(
                    Exception::new(
                        Severity::Medium,
                        ExceptionCategory::System,
                        "Complaint answered automatically",
                        "an auto-reply was sent; the complaint still needs human follow-up",
                    )
                    .with_property(thread.property_id),
                );
                deps.notify_manager(
                    thread.property_id,
                    "Tenant complaint",
                    &message.body,
                    NotificationKind::Escalation,
                    Some(EntityRef::new("message_thread", thread.id)),
                )?;
                return Ok(Outcome::Escalated(
                    "complaint answered and escalated".to_string(),
                ));
            }

            Ok(Outcome::Completed("auto-reply sent".to_string()))
        }
    }
}
