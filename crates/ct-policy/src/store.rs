// store.rs — PolicyStore: precedence resolution over scoped policy records.
//
// Policy records are edited in the platform and arrive here as loose JSON
// overrides, each scoped to either the whole portfolio or one property and
// stamped with a version. Resolution order:
//
//   property-scoped record  >  global record  >  compiled-in default
//
// Within one scope, the highest active version wins. The effective config
// is produced by a two-stage merge: global over default, then property over
// that.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{merge_policy, PolicyConfig};

/// What a policy record applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum PolicyScope {
    /// Applies to every property the manager runs.
    Global,
    /// Applies to a single property, overriding the global layer.
    Property { property_id: Uuid },
}

/// One versioned policy override record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: Uuid,
    pub scope: PolicyScope,
    pub version: u32,
    pub active: bool,
    /// Section-wise overrides; see [`merge_policy`].
    pub overrides: Value,
}

impl PolicyRecord {
    pub fn new(scope: PolicyScope, version: u32, overrides: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            version,
            active: true,
            overrides,
        }
    }
}

/// Resolves the effective policy for a scope from loaded records.
///
/// Records are loaded once (by the hosting process, from the platform
/// database) and the store is then shared read-only across runs.
pub struct PolicyStore {
    records: Vec<PolicyRecord>,
}

impl PolicyStore {
    /// An empty store — every property resolves to the compiled default.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn with_records(records: Vec<PolicyRecord>) -> Self {
        Self { records }
    }

    /// Load a policy record. Inactive records are kept but never win.
    pub fn add_record(&mut self, record: PolicyRecord) {
        self.records.push(record);
    }

    /// Resolve the effective policy for a property.
    ///
    /// Two-stage merge: the winning global record over the compiled default,
    /// then the winning property record over that.
    pub fn effective_policy(&self, property_id: Uuid) -> PolicyConfig {
        let base = PolicyConfig::default_policy();

        let with_global = match self.winning(|s| *s == PolicyScope::Global) {
            Some(record) => merge_policy(&base, &record.overrides),
            None => base,
        };

        match self.winning(|s| {
            matches!(s, PolicyScope::Property { property_id: pid } if *pid == property_id)
        }) {
            Some(record) => merge_policy(&with_global, &record.overrides),
            None => with_global,
        }
    }

    /// The effective portfolio-wide policy (no property override layer).
    pub fn global_policy(&self) -> PolicyConfig {
        let base = PolicyConfig::default_policy();
        match self.winning(|s| *s == PolicyScope::Global) {
            Some(record) => merge_policy(&base, &record.overrides),
            None => base,
        }
    }

    /// Highest-version active record whose scope matches the predicate.
    fn winning(&self, matches_scope: impl Fn(&PolicyScope) -> bool) -> Option<&PolicyRecord> {
        self.records
            .iter()
            .filter(|r| r.active && matches_scope(&r.scope))
            .max_by_key(|r| r.version)
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}
