//! # ct-policy
//!
//! The policy layer of Caretaker: what the agent may do on its own, what
//! needs a human signature, and what is flatly off-limits.
//!
//! ## Key components
//!
//! - [`PolicyConfig`] — immutable nested configuration with a compiled-in
//!   default, produced by section-wise deep merge of scoped overrides
//! - [`PolicyStore`] — precedence resolution (property beats global beats
//!   default; highest active version wins within a scope)
//! - [`evaluate`] — the pure decision function: every automated action is
//!   classified Allow / Approval / Block with a stated reason
//! - [`quiet_hours`] — minute-of-day window math with overnight wrap
//!
//! The engine is deliberately fail-safe: an action type it does not
//! recognize is never allowed — it is routed to a human instead.

pub mod config;
pub mod engine;
pub mod legal;
pub mod quiet_hours;
pub mod store;

pub use config::{merge_policy, MinuteOfDay, PolicyConfig, QuietHours};
pub use engine::{evaluate, Decision, PolicyRequest, PolicyVerdict};
pub use legal::has_legal_keywords;
pub use quiet_hours::{is_in_quiet_hours, minute_of_day};
pub use store::{PolicyRecord, PolicyScope, PolicyStore};
