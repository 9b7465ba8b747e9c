// error.rs — The action-layer error taxonomy.
//
// Forbidden and NotFound surface synchronously, before any side effect.
// Policy rejections are not failures of the machinery — they are the policy
// doing its job — but they travel the same channel so the executor has a
// single rejection path.

use thiserror::Error;
use uuid::Uuid;

use ct_domain::error::DomainError;

#[derive(Debug, Error)]
pub enum ActionError {
    /// The actor does not own (or is not linked to) an entity the action
    /// references. The reason names the exact failing check.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Policy returned Block.
    #[error("policy blocked: {reason}")]
    PolicyBlocked { reason: String },

    /// Policy returned Approval; the action stays queued for a human.
    #[error("policy requires approval: {reason}")]
    PolicyRequiresApproval { reason: String },

    /// The entity exists but is not in a state this action applies to.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for ActionError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity, id } => ActionError::NotFound { entity, id },
            other => ActionError::Storage(other.to_string()),
        }
    }
}
