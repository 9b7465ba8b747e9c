//! # ct-agent
//!
//! The interactive side of Caretaker: a manager starts a session, the model
//! surveys the portfolio, and anything it wants to change is proposed as an
//! [`AgentAction`](ct_actions::AgentAction) through the same policy-gated
//! executor the fixed workflows use.
//!
//! Two hard guarantees:
//!
//! - The loop is bounded ([`MAX_TURNS`]). A model that never concludes gets
//!   its run escalated, not an unbounded conversation.
//! - The auto-execute allow-list narrows, never widens, what policy permits.
//!   An action must be both on the list and allowed by policy to run.

pub mod error;
pub mod portfolio;
pub mod session;

pub use error::AgentError;
pub use portfolio::PortfolioSnapshot;
pub use session::{AgentSession, SessionReport, MAX_TURNS};
