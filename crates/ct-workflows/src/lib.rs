// lib.rs — The four fixed workflows.
//
// Each workflow is a plain function: it takes the shared [`WorkflowDeps`]
// bundle and a trigger naming an already-created run, drives the run through
// its steps, and always leaves the run in a terminal state. Triggers carry
// the run id rather than creating runs themselves so the dedupe decision
// (one run per trigger key) stays with the dispatcher.
//
// - `maintenance` — PM schedules, incident intake, unassigned work orders
// - `comms`       — classify and answer (or refuse to answer) tenant messages
// - `compliance`  — scan deadlines, create remediation work, audit PM cadence
// - `sla`         — respond to blown SLA deadlines with reassignment

pub mod comms;
pub mod compliance;
pub mod deps;
pub mod error;
pub mod maintenance;
pub mod sla;
pub mod vendor_select;

#[cfg(test)]
mod testutil;

pub use comms::{run_comms, CommsTrigger};
pub use compliance::{run_compliance, ComplianceTrigger};
pub use deps::WorkflowDeps;
pub use error::WorkflowError;
pub use maintenance::{run_maintenance, MaintenanceTrigger, MaintenanceTriggerKind};
pub use sla::{run_sla_breach, SlaBreachTrigger};
pub use vendor_select::{first_allowed_vendor, rank_candidates};
