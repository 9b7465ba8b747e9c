// testutil.rs — Shared fixtures for the workflow test suites.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use ct_domain::collab::{Classification, Clock, FixedClock, RecordingNotifier, ReasoningService};
use ct_domain::error::DomainError;
use ct_domain::memrepo::InMemoryPlatform;
use ct_domain::messaging::MessageIntent;
use ct_domain::property::Property;
use ct_domain::vendor::Vendor;
use ct_domain::work_order::WorkOrderCategory;
use ct_ledger::{CreateRunOutcome, Exception, Run, RunLedger, TriggerType};
use ct_memory::{InMemoryStore, Memory};
use ct_policy::PolicyStore;
use tempfile::TempDir;

use crate::deps::WorkflowDeps;

/// A reasoning service with canned answers.
pub struct StubReasoning {
    pub intent: MessageIntent,
    pub legal: bool,
    pub fail_classify: bool,
    pub draft_text: String,
}

impl Default for StubReasoning {
    fn default() -> Self {
        Self {
            intent: MessageIntent::GeneralQuestion,
            legal: false,
            fail_classify: false,
            draft_text: "Thanks for reaching out — we're on it.".to_string(),
        }
    }
}

impl ReasoningService for StubReasoning {
    fn classify(&self, _text: &str) -> Result<Classification, DomainError> {
        if self.fail_classify {
            return Err(DomainError::Reasoning("model unavailable".to_string()));
        }
        Ok(Classification {
            intent: self.intent,
            has_legal_keywords: self.legal,
        })
    }

    fn draft(&self, _context: &str, _tone: Option<&str>) -> Result<String, DomainError> {
        Ok(self.draft_text.clone())
    }
}

pub struct Fixture {
    pub platform: InMemoryPlatform,
    pub deps: WorkflowDeps,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
    pub manager: Uuid,
    pub property_id: Uuid,
    _dir: TempDir,
}

/// A fixture with the default policy, one property, and a clock pinned to
/// midday (outside quiet hours).
pub fn fixture() -> Fixture {
    fixture_with_reasoning(StubReasoning::default())
}

pub fn fixture_with_reasoning(reasoning: StubReasoning) -> Fixture {
    let dir = TempDir::new().unwrap();
    let platform = InMemoryPlatform::new();
    let manager = Uuid::new_v4();
    let property = Property {
        id: Uuid::new_v4(),
        manager_id: manager,
        name: "12 Elm St".to_string(),
        address: "12 Elm St".to_string(),
    };
    let property_id = property.id;
    platform.properties.add(property);

    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
    ));
    let notifier = Arc::new(RecordingNotifier::new());
    let ledger = Arc::new(RunLedger::open(dir.path()).unwrap());

    let deps = WorkflowDeps {
        repos: platform.repos(),
        memory: Memory::new(Arc::new(InMemoryStore::new())),
        ledger,
        policies: Arc::new(PolicyStore::new()),
        reasoning: Arc::new(reasoning),
        notifier: notifier.clone(),
        clock: clock.clone(),
    };

    Fixture {
        platform,
        deps,
        notifier,
        clock,
        manager,
        property_id,
        _dir: dir,
    }
}

impl Fixture {
    /// Create a queued run the way the trigger dispatcher would.
    pub fn queued_run(&self, trigger_type: TriggerType, key: &str) -> Uuid {
        match self
            .deps
            .ledger
            .create_run(trigger_type, key, Some(self.property_id))
            .unwrap()
        {
            CreateRunOutcome::Created(run) => run.id,
            CreateRunOutcome::Duplicate(id) => id,
        }
    }

    pub fn run(&self, run_id: Uuid) -> Run {
        self.deps.ledger.get_run(run_id).unwrap().unwrap()
    }

    pub fn exceptions(&self, run_id: Uuid) -> Vec<Exception> {
        self.deps.ledger.exceptions_for_run(run_id).unwrap()
    }

    /// Seed an active, licensed, insured vendor linked to the fixture's
    /// property.
    pub fn add_vendor(&self, name: &str, score: f64, categories: &[WorkOrderCategory]) -> Vendor {
        let vendor = Vendor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
            performance_score: score,
            categories: categories.to_vec(),
            license_expires_at: Some(self.clock.now() + Duration::days(90)),
            insurance_valid: true,
        };
        self.platform.vendors.add(vendor.clone());
        self.platform.vendors.link(vendor.id, self.property_id);
        vendor
    }
}
