// dedupe.rs — Deterministic idempotency keys for trigger deduplication.
//
// The trigger dispatcher delivers at-least-once. A run's dedupe key is a
// pure function of trigger identity plus a time bucket; two deliveries of
// the same trigger within a bucket produce the same key and the second is
// skipped, while the next bucket's delivery produces a fresh key and runs.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::run::TriggerType;

/// Build the pipe-joined dedupe key.
///
/// `trigger_type | trigger_ref | property_id | date_bucket` — a missing
/// property yields an empty third segment. Identical inputs always produce
/// identical keys; any differing input produces a differing key.
pub fn make_dedupe_key(
    trigger_type: TriggerType,
    trigger_ref: &str,
    property_id: Option<Uuid>,
    date_bucket: &str,
) -> String {
    let property = property_id.map(|id| id.to_string()).unwrap_or_default();
    format!(
        "{}|{}|{}|{}",
        trigger_type, trigger_ref, property, date_bucket
    )
}

/// Bucket a timestamp to the hour: "2026-08-31T14". Callers bucket before
/// building the key so a rerun within the hour is suppressed and the next
/// hour's rerun is allowed.
pub fn hour_bucket(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H").to_string()
}

/// Bucket a timestamp to the day: "2026-08-31". Used by once-a-day triggers
/// like the compliance scan.
pub fn day_bucket(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
