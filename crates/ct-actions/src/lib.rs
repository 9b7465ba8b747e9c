//! # ct-actions
//!
//! The action layer: every side effect the agent proposes — by a workflow or
//! by the agentic session loop — is an [`AgentAction`] and goes through one
//! funnel, [`ActionExecutor::execute`]:
//!
//! 1. actor gate — the action must belong to the acting manager
//! 2. ownership scope — [`validate_scope`] walks every referenced entity
//!    back to a property the actor manages
//! 3. policy — live context is re-derived from persistence and the clock,
//!    then evaluated; only Allow proceeds
//! 4. dispatch — the typed side effect, business-idempotent where it can be
//! 5. notify and audit
//!
//! Nothing in this crate panics on a bad proposal; every path returns an
//! [`ExecutionOutcome`].

pub mod action;
pub mod error;
pub mod executor;
pub mod validator;

pub use action::{ActionKind, ActionStatus, AgentAction};
pub use error::ActionError;
pub use executor::{ActionExecutor, ExecutionOutcome};
pub use validator::validate_scope;
