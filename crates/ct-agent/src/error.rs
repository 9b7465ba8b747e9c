// error.rs — Session-level errors.

use thiserror::Error;
use uuid::Uuid;

use ct_domain::error::DomainError;
use ct_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The session key was already consumed; the earlier run owns it.
    #[error("a session for this key already exists (run {0})")]
    DuplicateSession(Uuid),
}
