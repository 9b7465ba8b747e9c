// error.rs — Error types for the execution ledger.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize ledger data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The requested Run was not found.
    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    /// Invalid run state transition.
    #[error("invalid run transition from {from} to {to} for run {run_id}")]
    InvalidRunTransition {
        run_id: Uuid,
        from: String,
        to: String,
    },

    /// A step index does not refer to a step of this run.
    #[error("no step at index {idx} for run {run_id}")]
    UnknownStep { run_id: Uuid, idx: usize },

    /// Invalid step state transition.
    #[error("invalid step transition from {from} to {to} for step {step_id}")]
    InvalidStepTransition {
        step_id: Uuid,
        from: String,
        to: String,
    },

    /// The action log's hash chain does not verify.
    #[error("action log integrity violation at line {line}: expected previous hash {expected}, found {actual}")]
    IntegrityViolation {
        line: usize,
        expected: String,
        actual: String,
    },
}
