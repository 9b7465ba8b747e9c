//! # ct-memory
//!
//! The agent's long-lived memory: small facts observed while working that
//! improve the next run. Which vendor handled plumbing well at a property,
//! how often a vendor has blown an SLA, what a tenant last wrote about.
//!
//! Entries are keyed by `(scope, key)` where a scope is a `(kind, id)` pair
//! (property, vendor, tenant, or global). Upsert-only — no history is kept;
//! the ledger is the system of record for what happened, memory only holds
//! the current belief.
//!
//! ## Key components
//!
//! - [`MemoryStore`] — the storage trait: read, upsert, and an atomic
//!   counter increment (a single locked operation, not read-then-write)
//! - [`InMemoryStore`] — `Mutex<HashMap>` implementation
//! - [`Memory`] — typed helpers over the raw store: preferred vendors,
//!   SLA breach counters, tenant comms context, compliance scan snapshots

pub mod error;
pub mod store;
pub mod typed;

pub use error::MemoryError;
pub use store::{InMemoryStore, MemoryEntry, MemoryScope, MemoryStore, ScopeKind};
pub use typed::{CommsContext, ComplianceScanSnapshot, Memory};
