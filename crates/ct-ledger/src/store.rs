// store.rs — RunLedger: file-backed persistence for runs, steps, and
// exceptions, plus the shared action log.
//
// One JSON file per record keeps the ledger trivially inspectable:
//
//   <root>/runs/<run_id>.json
//   <root>/steps/<run_id>/<step_id>.json
//   <root>/exceptions/<exception_id>.json
//   <root>/actions.jsonl
//
// `create_run` is insert-or-skip on the dedupe key under one lock — the
// in-process idempotency boundary. A database-backed ledger should map the
// same contract onto a unique constraint.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::action_log::{ActionLog, ActionRecord};
use crate::error::LedgerError;
use crate::exception::Exception;
use crate::run::{Run, RunStatus, TriggerType};
use crate::step::Step;

/// Result of attempting to create a run for a dedupe key.
#[derive(Debug)]
pub enum CreateRunOutcome {
    /// A new run was created and persisted in Queued.
    Created(Run),
    /// A run already exists for this key; the id is the prior run's.
    Duplicate(Uuid),
}

/// File-backed execution ledger.
pub struct RunLedger {
    runs_dir: PathBuf,
    steps_dir: PathBuf,
    exceptions_dir: PathBuf,
    log: Mutex<ActionLog>,
    /// dedupe key → run id, loaded at open. Guarded by its own lock so
    /// insert-or-skip is atomic within this process.
    keys: Mutex<HashMap<String, Uuid>>,
}

impl RunLedger {
    /// Open (or create) a ledger rooted at the given directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let root = root.as_ref().to_path_buf();
        let runs_dir = root.join("runs");
        let steps_dir = root.join("steps");
        let exceptions_dir = root.join("exceptions");
        for dir in [&runs_dir, &steps_dir, &exceptions_dir] {
            fs::create_dir_all(dir).map_err(|source| LedgerError::IoError {
                path: dir.display().to_string(),
                source,
            })?;
        }

        let log = ActionLog::open(root.join("actions.jsonl"))?;

        let ledger = Self {
            runs_dir,
            steps_dir,
            exceptions_dir,
            log: Mutex::new(log),
            keys: Mutex::new(HashMap::new()),
        };
        ledger.rebuild_key_index()?;
        Ok(ledger)
    }

    /// Create a run for a dedupe key, or skip if one already exists.
    pub fn create_run(
        &self,
        trigger_type: TriggerType,
        dedupe_key: &str,
        property_id: Option<Uuid>,
    ) -> Result<CreateRunOutcome, LedgerError> {
        // The key lock is held across the existence check and the save so
        // two concurrent deliveries of the same trigger cannot both insert.
        let mut keys = self
            .keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = keys.get(dedupe_key) {
            return Ok(CreateRunOutcome::Duplicate(*existing));
        }

        let run = Run::new(trigger_type, dedupe_key, property_id);
        self.write_run(&run)?;
        keys.insert(dedupe_key.to_string(), run.id);
        Ok(CreateRunOutcome::Created(run))
    }

    /// Whether a run was already created for this dedupe key.
    pub fn run_exists_for_key(&self, dedupe_key: &str) -> Result<bool, LedgerError> {
        Ok(self
            .keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(dedupe_key))
    }

    pub fn get_run(&self, run_id: Uuid) -> Result<Option<Run>, LedgerError> {
        let path = self.run_file(run_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| LedgerError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn save_run(&self, run: &Run) -> Result<(), LedgerError> {
        self.write_run(run)
    }

    /// All runs, newest first.
    pub fn list_runs(&self) -> Result<Vec<Run>, LedgerError> {
        let mut runs: Vec<Run> = Vec::new();
        for json in self.read_dir_json(&self.runs_dir)? {
            if let Ok(run) = serde_json::from_str::<Run>(&json) {
                runs.push(run);
            }
        }
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    pub fn list_runs_by_status(&self, status: RunStatus) -> Result<Vec<Run>, LedgerError> {
        Ok(self
            .list_runs()?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    pub fn save_step(&self, step: &Step) -> Result<(), LedgerError> {
        let dir = self.steps_dir.join(step.run_id.to_string());
        fs::create_dir_all(&dir).map_err(|source| LedgerError::IoError {
            path: dir.display().to_string(),
            source,
        })?;
        let path = dir.join(format!("{}.json", step.id));
        let json = serde_json::to_string_pretty(step)?;
        fs::write(&path, json).map_err(|source| LedgerError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Steps of a run in execution order.
    pub fn steps_for_run(&self, run_id: Uuid) -> Result<Vec<Step>, LedgerError> {
        let dir = self.steps_dir.join(run_id.to_string());
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut steps: Vec<Step> = Vec::new();
        for json in self.read_dir_json(&dir)? {
            if let Ok(step) = serde_json::from_str::<Step>(&json) {
                steps.push(step);
            }
        }
        steps.sort_by_key(|s| s.step_order);
        Ok(steps)
    }

    /// Persist an exception. Best-effort: a write failure is logged and the
    /// correlation id is still returned so the caller can reference it.
    pub fn create_exception(&self, exception: &Exception) -> Uuid {
        let path = self.exceptions_dir.join(format!("{}.json", exception.id));
        let result = serde_json::to_string_pretty(exception)
            .map_err(LedgerError::from)
            .and_then(|json| {
                fs::write(&path, json).map_err(|source| LedgerError::IoError {
                    path: path.display().to_string(),
                    source,
                })
            });
        if let Err(e) = result {
            tracing::warn!(exception_id = %exception.id, "failed to persist exception: {}", e);
        }
        exception.id
    }

    pub fn exceptions_for_run(&self, run_id: Uuid) -> Result<Vec<Exception>, LedgerError> {
        let mut exceptions: Vec<Exception> = Vec::new();
        for json in self.read_dir_json(&self.exceptions_dir)? {
            if let Ok(exception) = serde_json::from_str::<Exception>(&json) {
                if exception.run_id == Some(run_id) {
                    exceptions.push(exception);
                }
            }
        }
        exceptions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(exceptions)
    }

    /// Append one immutable record to the action log.
    pub fn log_action(&self, mut record: ActionRecord) -> Result<(), LedgerError> {
        let mut log = self
            .log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        log.append(&mut record)
    }

    /// All action records, oldest first.
    pub fn read_actions(&self) -> Result<Vec<ActionRecord>, LedgerError> {
        let path = self
            .log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .path()
            .to_path_buf();
        ActionLog::read_all(path)
    }

    /// Verify the action log's hash chain.
    pub fn verify_actions(&self) -> Result<bool, LedgerError> {
        let path = self
            .log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .path()
            .to_path_buf();
        ActionLog::verify_chain(path)
    }

    fn run_file(&self, run_id: Uuid) -> PathBuf {
        self.runs_dir.join(format!("{}.json", run_id))
    }

    fn write_run(&self, run: &Run) -> Result<(), LedgerError> {
        let path = self.run_file(run.id);
        let json = serde_json::to_string_pretty(run)?;
        fs::write(&path, json).map_err(|source| LedgerError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Rebuild the dedupe index from persisted runs at open.
    fn rebuild_key_index(&self) -> Result<(), LedgerError> {
        let mut keys = self
            .keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for json in self.read_dir_json(&self.runs_dir)? {
            if let Ok(run) = serde_json::from_str::<Run>(&json) {
                keys.insert(run.trigger_ref.clone(), run.id);
            }
        }
        Ok(())
    }

    fn read_dir_json(&self, dir: &Path) -> Result<Vec<String>, LedgerError> {
        let entries = fs::read_dir(dir).map_err(|source| LedgerError::IoError {
            path: dir.display().to_string(),
            source,
        })?;
        let mut contents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LedgerError::IoError {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| LedgerError::IoError {
                    path: path.display().to_string(),
                    source,
                })?;
                contents.push(json);
            }
        }
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action_log::ActionKind;
    use crate::exception::{ExceptionCategory, Severity};
    use crate::run::RunStatus;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn create_run_then_duplicate_is_skipped() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(dir.path()).unwrap();

        let first = ledger
            .create_run(TriggerType::PmDue, "pm_due|s1||2026-08-31T10", None)
            .unwrap();
        let run_id = match first {
            CreateRunOutcome::Created(run) => run.id,
            other => panic!("expected Created, got {:?}", other),
        };

        let second = ledger
            .create_run(TriggerType::PmDue, "pm_due|s1||2026-08-31T10", None)
            .unwrap();
        match second {
            CreateRunOutcome::Duplicate(id) => assert_eq!(id, run_id),
            other => panic!("expected Duplicate, got {:?}", other),
        }

        assert!(ledger.run_exists_for_key("pm_due|s1||2026-08-31T10").unwrap());
        assert!(!ledger.run_exists_for_key("pm_due|s1||2026-08-31T11").unwrap());
    }

    #[test]
    fn dedupe_index_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let ledger = RunLedger::open(dir.path()).unwrap();
            ledger
                .create_run(TriggerType::SlaBreach, "sla|wo-1||b", None)
                .unwrap();
        }
        {
            let ledger = RunLedger::open(dir.path()).unwrap();
            assert!(ledger.run_exists_for_key("sla|wo-1||b").unwrap());
            match ledger
                .create_run(TriggerType::SlaBreach, "sla|wo-1||b", None)
                .unwrap()
            {
                CreateRunOutcome::Duplicate(_) => {}
                other => panic!("expected Duplicate, got {:?}", other),
            }
        }
    }

    #[test]
    fn run_round_trip_and_status_listing() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(dir.path()).unwrap();

        let mut run = match ledger
            .create_run(TriggerType::TenantMessage, "k1", Some(Uuid::new_v4()))
            .unwrap()
        {
            CreateRunOutcome::Created(run) => run,
            other => panic!("expected Created, got {:?}", other),
        };
        run.transition(RunStatus::Running).unwrap();
        run.transition(RunStatus::Escalated).unwrap();
        ledger.save_run(&run).unwrap();

        let reloaded = ledger.get_run(run.id).unwrap().unwrap();
        assert_eq!(reloaded.status, RunStatus::Escalated);

        assert_eq!(ledger.list_runs_by_status(RunStatus::Escalated).unwrap().len(), 1);
        assert!(ledger.list_runs_by_status(RunStatus::Completed).unwrap().is_empty());
    }

    #[test]
    fn get_missing_run_returns_none() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(dir.path()).unwrap();
        assert!(ledger.get_run(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn steps_come_back_in_order() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(dir.path()).unwrap();
        let run_id = Uuid::new_v4();

        // Save out of order on purpose.
        ledger
            .save_step(&Step::new(run_id, 2, "second", json!({})))
            .unwrap();
        ledger
            .save_step(&Step::new(run_id, 1, "first", json!({})))
            .unwrap();

        let steps = ledger.steps_for_run(run_id).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "first");
        assert_eq!(steps[1].name, "second");
    }

    #[test]
    fn steps_for_unknown_run_is_empty() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(dir.path()).unwrap();
        assert!(ledger.steps_for_run(Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn exceptions_filter_by_run() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(dir.path()).unwrap();
        let run_id = Uuid::new_v4();

        let mine = Exception::new(Severity::High, ExceptionCategory::Sla, "t", "d")
            .with_run(run_id);
        let other = Exception::new(Severity::Low, ExceptionCategory::System, "t", "d")
            .with_run(Uuid::new_v4());

        let mine_id = ledger.create_exception(&mine);
        ledger.create_exception(&other);

        let found = ledger.exceptions_for_run(run_id).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, mine_id);
    }

    #[test]
    fn action_log_integrates_with_ledger() {
        let dir = tempdir().unwrap();
        let ledger = RunLedger::open(dir.path()).unwrap();

        ledger
            .log_action(ActionRecord::new(ActionKind::Decision, "first"))
            .unwrap();
        ledger
            .log_action(ActionRecord::new(ActionKind::ApiCall, "second"))
            .unwrap();

        let actions = ledger.read_actions().unwrap();
        assert_eq!(actions.len(), 2);
        assert!(ledger.verify_actions().unwrap());
    }
}
