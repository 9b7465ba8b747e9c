// error.rs — Error types shared across the domain layer.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by repositories and collaborators.
///
/// `NotFound` is deliberately its own variant: workflows treat a missing
/// primary entity as a failed run with no human escalation, which is a
/// different outcome from a storage fault.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// The backing store failed (connection, I/O, constraint).
    #[error("storage error: {0}")]
    Storage(String),

    /// The reasoning service failed or returned an unusable response.
    #[error("reasoning service error: {0}")]
    Reasoning(String),

    /// Failed to serialize/deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Shorthand for the NotFound variant.
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        DomainError::NotFound { entity, id }
    }

    /// Whether this error is a missing-entity error (vs. a fault).
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound { .. })
    }
}
