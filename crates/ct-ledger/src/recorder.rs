// recorder.rs — RunRecorder: the workflow-facing handle for one run.
//
// A workflow never touches the ledger files directly. It begins a recorder,
// opens and closes steps through it, logs actions, raises exceptions, and
// terminates the run exactly once via `complete`, `escalate`, or `fail`
// (which consume the recorder). The recorder guarantees that no step is
// left non-terminal when the run terminates.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::action_log::{ActionKind, ActionRecord};
use crate::error::LedgerError;
use crate::exception::Exception;
use crate::run::{Run, RunStatus};
use crate::step::{Step, StepStatus};
use crate::store::RunLedger;

pub struct RunRecorder {
    ledger: Arc<RunLedger>,
    run: Run,
    steps: Vec<Step>,
}

impl RunRecorder {
    /// Load a queued run and move it to Running.
    pub fn begin(ledger: Arc<RunLedger>, run_id: Uuid) -> Result<Self, LedgerError> {
        let mut run = ledger
            .get_run(run_id)?
            .ok_or(LedgerError::RunNotFound(run_id))?;
        run.transition(RunStatus::Running)?;
        ledger.save_run(&run)?;
        Ok(Self {
            ledger,
            run,
            steps: Vec::new(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run.id
    }

    pub fn property_id(&self) -> Option<Uuid> {
        self.run.property_id
    }

    /// Open a new step and start it. Returns an index for closing it later.
    pub fn step_start(&mut self, name: &str, input: Value) -> Result<usize, LedgerError> {
        let order = self.steps.len() as u32 + 1;
        let mut step = Step::new(self.run.id, order, name, input);
        step.transition(StepStatus::Running)?;
        self.ledger.save_step(&step)?;
        self.steps.push(step);
        Ok(self.steps.len() - 1)
    }

    pub fn step_done(&mut self, idx: usize, output: Value) -> Result<(), LedgerError> {
        let ledger = Arc::clone(&self.ledger);
        let step = self.step_at(idx)?;
        step.transition(StepStatus::Done)?;
        step.output = output;
        ledger.save_step(step)
    }

    pub fn step_failed(&mut self, idx: usize, error: &str) -> Result<(), LedgerError> {
        let ledger = Arc::clone(&self.ledger);
        let step = self.step_at(idx)?;
        step.transition(StepStatus::Failed)?;
        step.error = Some(error.to_string());
        ledger.save_step(step)
    }

    fn step_at(&mut self, idx: usize) -> Result<&mut Step, LedgerError> {
        let run_id = self.run.id;
        self.steps
            .get_mut(idx)
            .ok_or(LedgerError::UnknownStep { run_id, idx })
    }

    /// Append an action record stamped with this run's id. Best-effort: a
    /// telemetry failure must not abort the work it describes.
    pub fn log(&self, record: ActionRecord) {
        if let Err(e) = self.ledger.log_action(record.with_run(self.run.id)) {
            tracing::warn!(run_id = %self.run.id, "failed to append action record: {}", e);
        }
    }

    pub fn log_decision(&self, description: &str, decision: &str, reason: &str) {
        self.log(ActionRecord::new(ActionKind::Decision, description).with_policy(decision, reason));
    }

    pub fn log_api_call(&self, description: &str, payload: &Value) {
        self.log(ActionRecord::new(ActionKind::ApiCall, description).with_payload(payload));
    }

    pub fn log_memory_read(&self, description: &str) {
        self.log(ActionRecord::new(ActionKind::MemoryRead, description));
    }

    pub fn log_memory_write(&self, description: &str) {
        self.log(ActionRecord::new(ActionKind::MemoryWrite, description));
    }

    /// Raise an exception tied to this run and log the escalation.
    pub fn exception(&self, exception: Exception) -> Uuid {
        let exception = exception.with_run(self.run.id);
        let title = exception.title.clone();
        let id = self.ledger.create_exception(&exception);
        self.log(ActionRecord::new(ActionKind::Escalation, title));
        id
    }

    /// Terminate the run successfully.
    pub fn complete(self, summary: &str) -> Result<(), LedgerError> {
        self.finish(RunStatus::Completed, Some(summary), None)
    }

    /// Terminate the run as handed off to a human.
    pub fn escalate(self, summary: &str) -> Result<(), LedgerError> {
        self.finish(RunStatus::Escalated, Some(summary), None)
    }

    /// Terminate the run as failed.
    pub fn fail(self, error: &str) -> Result<(), LedgerError> {
        self.finish(RunStatus::Failed, None, Some(error))
    }

    fn finish(
        mut self,
        status: RunStatus,
        summary: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), LedgerError> {
        self.close_open_steps(status == RunStatus::Failed)?;
        self.run.summary = summary.map(str::to_string);
        self.run.error = error.map(str::to_string);
        self.run.transition(status)?;
        self.ledger.save_run(&self.run)
    }

    /// Drive every non-terminal step to a terminal status before the run
    /// itself terminates.
    fn close_open_steps(&mut self, failing: bool) -> Result<(), LedgerError> {
        for step in &mut self.steps {
            let next = match step.status {
                StepStatus::Running if failing => StepStatus::Failed,
                StepStatus::Running => StepStatus::Done,
                StepStatus::Planned => StepStatus::Skipped,
                _ => continue,
            };
            step.transition(next)?;
            if next == StepStatus::Failed && step.error.is_none() {
                step.error = Some("run terminated".to_string());
            }
            self.ledger.save_step(step)?;
        }
        Ok(())
    }
}
