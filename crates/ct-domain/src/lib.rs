//! # ct-domain
//!
//! Domain model and collaborator interfaces for Caretaker, the autonomous
//! back-office core of the property-management platform.
//!
//! This crate owns:
//!
//! - The operational entities the agent acts on (work orders, vendors,
//!   compliance items, preventive-maintenance schedules, leases, message
//!   threads, incidents)
//! - Repository traits — one per aggregate, exposing exactly the filtered
//!   queries the workflows need. The core never talks to a database directly;
//!   it depends only on these interfaces.
//! - Collaborator traits for the reasoning service, outbound notifications,
//!   and the clock, so every higher crate is testable without real I/O.
//!
//! In-memory repository implementations live in [`memrepo`]; they back the
//! test suites of every downstream crate and double as a reference for what
//! a database-backed implementation must provide.

pub mod collab;
pub mod compliance;
pub mod error;
pub mod memrepo;
pub mod messaging;
pub mod property;
pub mod repo;
pub mod vendor;
pub mod work_order;

pub use collab::{
    ChatOutcome, Classification, Clock, FixedClock, Notifier, ReasoningService, SystemClock,
    ToolCall, ToolResult,
};
pub use error::DomainError;
pub use messaging::MessageIntent;
pub use work_order::{WorkOrderCategory, WorkOrderPriority, WorkOrderStatus};
