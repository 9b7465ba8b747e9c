// error.rs — Internal workflow error.
//
// Anything that bubbles to a workflow entry point through this type marks
// the Run as Failed; partial progress (completed steps, created exceptions)
// is kept, never rolled back.

use thiserror::Error;

use ct_domain::error::DomainError;
use ct_ledger::LedgerError;
use ct_memory::MemoryError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
