//! # ct-ledger
//!
//! The execution ledger: every workflow invocation is a [`Run`], every unit
//! of work inside it a [`Step`], every atomic decision or side effect an
//! [`ActionRecord`] in an append-only, hash-chained log, and every handoff
//! to a human an [`Exception`].
//!
//! The ledger is operational telemetry plus the idempotency boundary:
//! [`make_dedupe_key`] derives a deterministic key from trigger identity and
//! a time bucket, and [`RunLedger::create_run`] is insert-or-skip on that
//! key, so an at-least-once trigger dispatcher can redeliver without double
//! execution.
//!
//! Nothing here is ever deleted or rewritten. A run that went wrong keeps
//! its partial steps and exceptions; that is the record of what happened.

pub mod action_log;
pub mod dedupe;
pub mod error;
pub mod exception;
pub mod recorder;
pub mod run;
pub mod step;
pub mod store;

pub use action_log::{ActionKind, ActionLog, ActionRecord};
pub use dedupe::{day_bucket, hour_bucket, make_dedupe_key};
pub use error::LedgerError;
pub use exception::{Exception, ExceptionCategory, ExceptionStatus, Severity};
pub use recorder::RunRecorder;
pub use run::{Run, RunStatus, TriggerType};
pub use step::{Step, StepStatus};
pub use store::{CreateRunOutcome, RunLedger};
