// session.rs — The bounded agentic session loop.
//
// A session is a manager-initiated conversation over their portfolio. The
// model sees a portfolio snapshot, requests tools turn by turn, and every
// mutation it proposes flows through the same ActionExecutor funnel as the
// fixed workflows. The loop is hard-bounded at MAX_TURNS; a model that never
// concludes gets an exception and a human, not an infinite loop.
//
// The auto-execute allow-list is a gate on top of policy, not instead of it:
// an action must be on the list to be attempted at all, and the executor
// still re-derives the policy context and can reject it.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use ct_actions::{ActionKind, ActionStatus, AgentAction, ExecutionOutcome};
use ct_domain::collab::{ChatOutcome, Clock, ReasoningService, ToolCall, ToolResult};
use ct_domain::repo::Repos;
use ct_domain::work_order::BidStatus;
use ct_ledger::{
    hour_bucket, make_dedupe_key, CreateRunOutcome, Exception, ExceptionCategory, RunLedger,
    RunRecorder, Severity, TriggerType,
};

use crate::error::AgentError;
use crate::portfolio::PortfolioSnapshot;

/// Hard ceiling on session turns.
pub const MAX_TURNS: u32 = 10;

/// How a session ended.
#[derive(Debug)]
pub struct SessionReport {
    pub run_id: Uuid,
    pub turns: u32,
    /// Every action the model proposed, in order, with final statuses.
    pub proposals: Vec<AgentAction>,
    /// The model's closing message. None when the turn budget ran out.
    pub final_message: Option<String>,
}

pub struct AgentSession {
    repos: Repos,
    ledger: Arc<RunLedger>,
    executor: ct_actions::ActionExecutor,
    reasoning: Arc<dyn ReasoningService>,
    clock: Arc<dyn Clock>,
    /// Action names (`ActionKind::name`) the session may execute without a
    /// human in the loop. Anything off the list stays PendingApproval.
    auto_execute: HashSet<String>,
}

impl AgentSession {
    pub fn new(
        repos: Repos,
        ledger: Arc<RunLedger>,
        executor: ct_actions::ActionExecutor,
        reasoning: Arc<dyn ReasoningService>,
        clock: Arc<dyn Clock>,
        auto_execute: HashSet<String>,
    ) -> Self {
        Self {
            repos,
            ledger,
            executor,
            reasoning,
            clock,
            auto_execute,
        }
    }

    /// Run one session for a manager. The session key joins the manager id
    /// and an hour bucket, so an accidental double-start within the hour is
    /// rejected as a duplicate.
    pub fn run(&self, manager_id: Uuid) -> Result<SessionReport, AgentError> {
        let key = make_dedupe_key(
            TriggerType::AgentSession,
            &manager_id.to_string(),
            None,
            &hour_bucket(&self.clock.now()),
        );
        let run = match self
            .ledger
            .create_run(TriggerType::AgentSession, &key, None)?
        {
            CreateRunOutcome::Created(run) => run,
            CreateRunOutcome::Duplicate(id) => return Err(AgentError::DuplicateSession(id)),
        };

        let mut recorder = RunRecorder::begin(self.ledger.clone(), run.id)?;
        match self.drive(manager_id, run.id, &mut recorder) {
            Ok((turns, proposals, Some(message))) => {
                recorder.complete(&format!("session ended after {} turns", turns))?;
                Ok(SessionReport {
                    run_id: run.id,
                    turns,
                    proposals,
                    final_message: Some(message),
                })
            }
            Ok((turns, proposals, None)) => {
                recorder.exception(Exception::new(
                    Severity::Medium,
                    ExceptionCategory::System,
                    "Session turn budget exhausted",
                    format!(
                        "the model did not conclude within {} turns; review its proposals",
                        MAX_TURNS
                    ),
                ));
                recorder.escalate("turn budget exhausted")?;
                Ok(SessionReport {
                    run_id: run.id,
                    turns,
                    proposals,
                    final_message: None,
                })
            }
            Err(error) => {
                tracing::warn!(run_id = %run.id, "session failed: {}", error);
                recorder.fail(&error.to_string())?;
                Err(error)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn drive(
        &self,
        manager_id: Uuid,
        run_id: Uuid,
        recorder: &mut RunRecorder,
    ) -> Result<(u32, Vec<AgentAction>, Option<String>), AgentError> {
        let idx = recorder.step_start("portfolio_snapshot", json!({ "manager_id": manager_id }))?;
        let snapshot = PortfolioSnapshot::gather(&self.repos, manager_id, self.clock.now())?;
        let context = snapshot.render();
        recorder.step_done(
            idx,
            json!({
                "unassigned_work_orders": snapshot.unassigned_work_orders.len(),
                "open_threads": snapshot.open_threads.len(),
                "expiring_leases": snapshot.expiring_leases.len(),
            }),
        )?;

        let mut proposals = Vec::new();
        let mut results: Vec<ToolResult> = Vec::new();

        for turn in 1..=MAX_TURNS {
            let calls = match self.reasoning.chat_turn(&context, &results)? {
                ChatOutcome::Final(message) => {
                    return Ok((turn, proposals, Some(message)));
                }
                ChatOutcome::ToolCalls(calls) => calls,
            };

            let idx = recorder.step_start(
                &format!("turn_{}", turn),
                json!({ "tool_calls": calls.len() }),
            )?;
            results = calls
                .into_iter()
                .map(|call| {
                    let output =
                        self.dispatch(manager_id, run_id, &call, recorder, &mut proposals);
                    ToolResult { call, output }
                })
                .collect();
            recorder.step_done(idx, json!({ "results": results.len() }))?;
        }

        Ok((MAX_TURNS, proposals, None))
    }

    /// Run one tool call. Tool failures become error outputs fed back to the
    /// model; they never abort the session.
    fn dispatch(
        &self,
        manager_id: Uuid,
        run_id: Uuid,
        call: &ToolCall,
        recorder: &RunRecorder,
        proposals: &mut Vec<AgentAction>,
    ) -> Value {
        match self.try_dispatch(manager_id, run_id, call, recorder, proposals) {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!(run_id = %run_id, "tool call failed: {}", error);
                json!({ "error": error.to_string() })
            }
        }
    }

    fn try_dispatch(
        &self,
        manager_id: Uuid,
        run_id: Uuid,
        call: &ToolCall,
        recorder: &RunRecorder,
        proposals: &mut Vec<AgentAction>,
    ) -> Result<Value, AgentError> {
        match call {
            ToolCall::ProposeAction { action, reasoning } => {
                let kind: ActionKind = match serde_json::from_value(action.clone()) {
                    Ok(kind) => kind,
                    Err(error) => {
                        return Ok(json!({
                            "error": format!("unrecognized action payload: {}", error)
                        }));
                    }
                };
                let name = kind.name();
                let mut proposal =
                    AgentAction::new(manager_id, kind).with_reasoning(reasoning.clone());

                let output = if self.auto_execute.contains(name) {
                    match self
                        .executor
                        .execute(&mut proposal, manager_id, Some(run_id))
                    {
                        ExecutionOutcome::Completed { detail } => {
                            json!({ "status": "executed", "detail": detail })
                        }
                        ExecutionOutcome::Rejected { error } => json!({
                            "status": proposal_status_name(&proposal),
                            "error": error.to_string(),
                        }),
                    }
                } else {
                    recorder.log_decision(
                        &format!("proposal {}", name),
                        "approval",
                        "action type is not on the session auto-execute list",
                    );
                    json!({ "status": "pending_approval" })
                };
                proposals.push(proposal);
                Ok(output)
            }

            ToolCall::GetBestVendor {
                property_id,
                category,
            } => {
                let now = self.clock.now();
                let best = self
                    .repos
                    .vendors
                    .active_for_category(*category)?
                    .into_iter()
                    .filter(|v| {
                        v.insurance_valid
                            && v.license_valid_at(now)
                            && self
                                .repos
                                .vendors
                                .linked_to_property(v.id, *property_id)
                                .unwrap_or(false)
                    })
                    .max_by(|a, b| {
                        a.performance_score
                            .partial_cmp(&b.performance_score)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });
                Ok(match best {
                    Some(vendor) => json!({
                        "vendor_id": vendor.id,
                        "name": vendor.name,
                        "performance_score": vendor.performance_score,
                    }),
                    None => json!({ "vendor_id": null }),
                })
            }

            ToolCall::DraftMessage { context, tone } => {
                let draft = self.reasoning.draft(context, tone.as_deref())?;
                Ok(json!({ "draft": draft }))
            }

            ToolCall::GetSubmittedBids { work_order_id } => {
                let bids: Vec<Value> = self
                    .repos
                    .bids
                    .for_work_order(*work_order_id)?
                    .into_iter()
                    .filter(|b| b.status == BidStatus::Submitted)
                    .map(|b| {
                        json!({
                            "bid_id": b.id,
                            "vendor_id": b.vendor_id,
                            "amount": b.amount,
                        })
                    })
                    .collect();
                Ok(json!({ "bids": bids }))
            }
        }
    }
}

fn proposal_status_name(proposal: &AgentAction) -> &'static str {
    match proposal.status {
        ActionStatus::PendingApproval => "pending_approval",
        ActionStatus::AutoExecuted => "executed",
        ActionStatus::Failed => "failed",
    }
}
