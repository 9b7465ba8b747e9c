// typed.rs — Typed helpers over the raw memory store.
//
// The workflows never touch raw JSON keys; they go through these helpers so
// every memory key used in the system is named in exactly one place.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use ct_domain::messaging::MessageIntent;
use ct_domain::work_order::WorkOrderCategory;

use crate::error::MemoryError;
use crate::store::{MemoryScope, MemoryStore};

/// Confidence recorded when a vendor preference is learned from a
/// successful assignment.
const PREFERRED_VENDOR_CONFIDENCE: f64 = 0.9;

const BREACH_COUNT_KEY: &str = "sla_breach_count";
const COMMS_CONTEXT_KEY: &str = "comms_context";
const COMPLIANCE_SCAN_KEY: &str = "compliance_scan";

/// Rolling context about a tenant's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommsContext {
    pub last_intent: MessageIntent,
    pub message_count: u64,
    pub last_message_at: DateTime<Utc>,
}

/// Snapshot of the most recent compliance scan for a property.
///
/// `total_exceptions_all_time` accumulates across scans: each write adds the
/// current scan's exception count to the previous running total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceScanSnapshot {
    pub last_scan_at: DateTime<Utc>,
    pub wo_created: u64,
    pub exceptions: u64,
    pub total_exceptions_all_time: u64,
}

/// Typed facade over a [`MemoryStore`].
#[derive(Clone)]
pub struct Memory {
    store: Arc<dyn MemoryStore>,
}

impl Memory {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Direct access to the underlying store, for callers with keys of
    /// their own.
    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    // ── Preferred vendor per property + category ──

    fn preferred_vendor_key(category: WorkOrderCategory) -> String {
        format!("preferred_vendor:{}", category)
    }

    /// The remembered best vendor for a trade at a property, if any.
    pub fn preferred_vendor(
        &self,
        property_id: Uuid,
        category: WorkOrderCategory,
    ) -> Result<Option<Uuid>, MemoryError> {
        let entry = self.store.read(
            &MemoryScope::property(property_id),
            &Self::preferred_vendor_key(category),
        )?;
        Ok(entry.and_then(|e| serde_json::from_value(e.value).ok()))
    }

    /// Remember a vendor as the preference for a trade at a property.
    pub fn set_preferred_vendor(
        &self,
        property_id: Uuid,
        category: WorkOrderCategory,
        vendor_id: Uuid,
    ) -> Result<(), MemoryError> {
        self.store.write(
            &MemoryScope::property(property_id),
            &Self::preferred_vendor_key(category),
            json!(vendor_id),
            Some(PREFERRED_VENDOR_CONFIDENCE),
        )
    }

    // ── Vendor SLA breach counter ──

    /// How many SLA breaches this vendor has accumulated. Defaults to zero.
    pub fn breach_count(&self, vendor_id: Uuid) -> Result<i64, MemoryError> {
        let entry = self
            .store
            .read(&MemoryScope::vendor(vendor_id), BREACH_COUNT_KEY)?;
        Ok(entry.and_then(|e| e.value.as_i64()).unwrap_or(0))
    }

    /// Record one more breach; returns the new count.
    pub fn record_breach(&self, vendor_id: Uuid) -> Result<i64, MemoryError> {
        self.store
            .increment(&MemoryScope::vendor(vendor_id), BREACH_COUNT_KEY)
    }

    // ── Tenant comms context ──

    pub fn comms_context(&self, tenant_id: Uuid) -> Result<Option<CommsContext>, MemoryError> {
        let entry = self
            .store
            .read(&MemoryScope::tenant(tenant_id), COMMS_CONTEXT_KEY)?;
        Ok(entry.and_then(|e| serde_json::from_value(e.value).ok()))
    }

    /// Fold one more classified message into the tenant's context.
    pub fn update_comms_context(
        &self,
        tenant_id: Uuid,
        intent: MessageIntent,
        at: DateTime<Utc>,
    ) -> Result<CommsContext, MemoryError> {
        let prior_count = self
            .comms_context(tenant_id)?
            .map(|c| c.message_count)
            .unwrap_or(0);
        let context = CommsContext {
            last_intent: intent,
            message_count: prior_count + 1,
            last_message_at: at,
        };
        self.store.write(
            &MemoryScope::tenant(tenant_id),
            COMMS_CONTEXT_KEY,
            serde_json::to_value(&context)?,
            None,
        )?;
        Ok(context)
    }

    // ── Compliance scan snapshot ──

    pub fn compliance_scan(
        &self,
        property_id: Uuid,
    ) -> Result<Option<ComplianceScanSnapshot>, MemoryError> {
        let entry = self
            .store
            .read(&MemoryScope::property(property_id), COMPLIANCE_SCAN_KEY)?;
        Ok(entry.and_then(|e| serde_json::from_value(e.value).ok()))
    }

    /// Persist the results of a compliance scan, accumulating the running
    /// all-time exception total.
    pub fn record_compliance_scan(
        &self,
        property_id: Uuid,
        wo_created: u64,
        exceptions: u64,
        at: DateTime<Utc>,
    ) -> Result<ComplianceScanSnapshot, MemoryError> {
        let prior_total = self
            .compliance_scan(property_id)?
            .map(|s| s.total_exceptions_all_time)
            .unwrap_or(0);
        let snapshot = ComplianceScanSnapshot {
            last_scan_at: at,
            wo_created,
            exceptions,
            total_exceptions_all_time: prior_total + exceptions,
        };
        self.store.write(
            &MemoryScope::property(property_id),
            COMPLIANCE_SCAN_KEY,
            serde_json::to_value(&snapshot)?,
            None,
        )?;
        Ok(snapshot)
    }
}
