// deps.rs — The collaborator bundle every workflow runs against.
//
// Workflows are plain functions over this bundle; nothing in it is global.
// The hosting process builds one WorkflowDeps at startup and clones it per
// run (everything inside is an Arc or a cheap handle).

use std::sync::Arc;

use uuid::Uuid;

use ct_domain::collab::{Clock, EntityRef, Notifier, NotificationKind, ReasoningService};
use ct_domain::error::DomainError;
use ct_domain::property::Property;
use ct_domain::repo::Repos;
use ct_ledger::RunLedger;
use ct_memory::Memory;
use ct_policy::PolicyStore;

use crate::error::WorkflowError;

/// How a workflow invocation wants its run terminated. Errors take the
/// third path (Failed) in [`finish`].
pub(crate) enum Outcome {
    Completed(String),
    Escalated(String),
}

/// Map a workflow body's result onto the run's terminal state.
pub(crate) fn finish(
    recorder: ct_ledger::RunRecorder,
    result: Result<Outcome, WorkflowError>,
) -> Result<(), ct_ledger::LedgerError> {
    match result {
        Ok(Outcome::Completed(summary)) => recorder.complete(&summary),
        Ok(Outcome::Escalated(summary)) => recorder.escalate(&summary),
        Err(error) => {
            tracing::warn!(run_id = %recorder.run_id(), "workflow failed: {}", error);
            recorder.fail(&error.to_string())
        }
    }
}

#[derive(Clone)]
pub struct WorkflowDeps {
    pub repos: Repos,
    pub memory: Memory,
    pub ledger: Arc<RunLedger>,
    pub policies: Arc<PolicyStore>,
    pub reasoning: Arc<dyn ReasoningService>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl WorkflowDeps {
    /// The property, or a NotFound that fails the run.
    pub(crate) fn property(&self, property_id: Uuid) -> Result<Property, WorkflowError> {
        self.repos
            .properties
            .get(property_id)?
            .ok_or_else(|| DomainError::not_found("property", property_id).into())
    }

    /// Notify the manager of a property. Fire-and-forget. Escalations are
    /// additionally announced on every channel the policy configures.
    pub(crate) fn notify_manager(
        &self,
        property_id: Uuid,
        title: &str,
        body: &str,
        kind: NotificationKind,
        entity_ref: Option<EntityRef>,
    ) -> Result<(), WorkflowError> {
        let property = self.property(property_id)?;
        if kind == NotificationKind::Escalation {
            let policy = self.policies.effective_policy(property_id);
            for channel in &policy.escalation.channels {
                tracing::info!(%property_id, channel = channel.as_str(), "escalation: {}", title);
            }
        }
        self.notifier
            .deliver(property.manager_id, title, body, kind, entity_ref);
        Ok(())
    }
}
