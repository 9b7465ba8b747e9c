// error.rs — Error types for the memory store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// The backing store failed.
    #[error("memory storage error: {0}")]
    Storage(String),

    /// A stored value did not deserialize into the expected shape.
    #[error("memory serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
