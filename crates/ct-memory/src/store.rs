// store.rs — The scoped key-value store behind agent memory.
//
// `(scope kind, scope id, key)` is the unique triple; writes upsert. The
// increment operation is first-class so counters are a single atomic
// operation inside the store, never a caller-side read-modify-write that
// two concurrent runs could interleave.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::MemoryError;

/// What kind of thing a memory entry is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Property,
    Vendor,
    Tenant,
    Global,
}

/// A `(kind, id)` pair identifying what an entry applies to. Global scope
/// carries no id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MemoryScope {
    pub kind: ScopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl MemoryScope {
    pub fn property(id: Uuid) -> Self {
        Self {
            kind: ScopeKind::Property,
            id: Some(id),
        }
    }

    pub fn vendor(id: Uuid) -> Self {
        Self {
            kind: ScopeKind::Vendor,
            id: Some(id),
        }
    }

    pub fn tenant(id: Uuid) -> Self {
        Self {
            kind: ScopeKind::Tenant,
            id: Some(id),
        }
    }

    pub fn global() -> Self {
        Self {
            kind: ScopeKind::Global,
            id: None,
        }
    }
}

/// One remembered fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub scope: MemoryScope,
    pub key: String,
    pub value: Value,
    /// How much the writer trusted this observation, in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Storage contract for agent memory. Implementations must support safe
/// concurrent upsert: runs for different triggers share nothing but this
/// store and persistence.
pub trait MemoryStore: Send + Sync {
    fn read(&self, scope: &MemoryScope, key: &str) -> Result<Option<MemoryEntry>, MemoryError>;

    fn write(
        &self,
        scope: &MemoryScope,
        key: &str,
        value: Value,
        confidence: Option<f64>,
    ) -> Result<(), MemoryError>;

    /// Atomically add one to an integer entry and return the new value.
    /// A missing or non-integer entry counts as zero.
    fn increment(&self, scope: &MemoryScope, key: &str) -> Result<i64, MemoryError>;
}

/// `Mutex<HashMap>`-backed memory store.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<(MemoryScope, String), MemoryEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryStore for InMemoryStore {
    fn read(&self, scope: &MemoryScope, key: &str) -> Result<Option<MemoryEntry>, MemoryError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| MemoryError::Storage("memory lock poisoned".to_string()))?;
        Ok(entries.get(&(*scope, key.to_string())).cloned())
    }

    fn write(
        &self,
        scope: &MemoryScope,
        key: &str,
        value: Value,
        confidence: Option<f64>,
    ) -> Result<(), MemoryError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| MemoryError::Storage("memory lock poisoned".to_string()))?;
        entries.insert(
            (*scope, key.to_string()),
            MemoryEntry {
                scope: *scope,
                key: key.to_string(),
                value,
                confidence,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn increment(&self, scope: &MemoryScope, key: &str) -> Result<i64, MemoryError> {
        // One lock acquisition covers the read and the write, so concurrent
        // increments cannot lose updates.
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| MemoryError::Storage("memory lock poisoned".to_string()))?;
        let map_key = (*scope, key.to_string());
        let current = entries
            .get(&map_key)
            .and_then(|e| e.value.as_i64())
            .unwrap_or(0);
        let next = current + 1;
        entries.insert(
            map_key,
            MemoryEntry {
                scope: *scope,
                key: key.to_string(),
                value: Value::from(next),
                confidence: None,
                updated_at: Utc::now(),
            },
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn write_then_read_round_trip() {
        let store = InMemoryStore::new();
        let scope = MemoryScope::property(Uuid::new_v4());

        store
            .write(&scope, "note", json!({"text": "gate code 4421"}), Some(0.8))
            .unwrap();

        let entry = store.read(&scope, "note").unwrap().unwrap();
        assert_eq!(entry.value["text"], "gate code 4421");
        assert_eq!(entry.confidence, Some(0.8));
    }

    #[test]
    fn write_upserts_in_place() {
        let store = InMemoryStore::new();
        let scope = MemoryScope::global();

        store.write(&scope, "k", json!(1), None).unwrap();
        store.write(&scope, "k", json!(2), None).unwrap();

        let entry = store.read(&scope, "k").unwrap().unwrap();
        assert_eq!(entry.value, json!(2));
    }

    #[test]
    fn scopes_are_isolated() {
        let store = InMemoryStore::new();
        let a = MemoryScope::vendor(Uuid::new_v4());
        let b = MemoryScope::vendor(Uuid::new_v4());

        store.write(&a, "k", json!("a"), None).unwrap();
        assert!(store.read(&b, "k").unwrap().is_none());
    }

    #[test]
    fn increment_starts_from_zero() {
        let store = InMemoryStore::new();
        let scope = MemoryScope::vendor(Uuid::new_v4());
        assert_eq!(store.increment(&scope, "count").unwrap(), 1);
        assert_eq!(store.increment(&scope, "count").unwrap(), 2);
    }

    #[test]
    fn increment_treats_non_integer_as_zero() {
        let store = InMemoryStore::new();
        let scope = MemoryScope::global();
        store.write(&scope, "count", json!("three"), None).unwrap();
        assert_eq!(store.increment(&scope, "count").unwrap(), 1);
    }

    #[test]
    fn concurrent_increments_lose_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let scope = MemoryScope::vendor(Uuid::new_v4());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    store.increment(&scope, "count").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let entry = store.read(&scope, "count").unwrap().unwrap();
        assert_eq!(entry.value.as_i64(), Some(800));
    }
}
