// config.rs — PolicyConfig: the versioned automation policy.
//
// A PolicyConfig is an immutable value. It is never held as mutable global
// state: the store resolves the effective config for a scope and hands it to
// the engine by reference.
//
// Overrides arrive as loose JSON from the platform (a policy record edited
// in the UI). Merging is per top-level section: a section present in the
// override replaces fields of the default section-by-field; quiet hours are
// merged as their own nested object. Anything that is not a JSON object is
// treated as "no override" — merging never fails.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ct_domain::messaging::MessageIntent;
use ct_domain::work_order::WorkOrderCategory;

/// A minute-of-day in [0, 1440). Serializes as "HH:MM"; deserializes from
/// either "HH:MM" or a raw minute count, so hand-edited overrides and
/// round-tripped configs both parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteOfDay(pub u16);

impl MinuteOfDay {
    /// Parse "HH:MM". Returns None for anything out of range or malformed.
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.split_once(':')?;
        let h: u16 = h.parse().ok()?;
        let m: u16 = m.parse().ok()?;
        if h > 23 || m > 59 {
            return None;
        }
        Some(MinuteOfDay(h * 60 + m))
    }
}

impl std::fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for MinuteOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MinuteOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MinuteVisitor;

        impl Visitor<'_> for MinuteVisitor {
            type Value = MinuteOfDay;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an \"HH:MM\" string or a minute count below 1440")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MinuteOfDay, E> {
                MinuteOfDay::parse(v)
                    .ok_or_else(|| E::custom(format!("invalid time of day: '{}'", v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MinuteOfDay, E> {
                if v < 1440 {
                    Ok(MinuteOfDay(v as u16))
                } else {
                    Err(E::custom(format!("minute of day out of range: {}", v)))
                }
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MinuteOfDay, E> {
                if (0..1440).contains(&v) {
                    Ok(MinuteOfDay(v as u16))
                } else {
                    Err(E::custom(format!("minute of day out of range: {}", v)))
                }
            }
        }

        deserializer.deserialize_any(MinuteVisitor)
    }
}

/// The no-auto-messaging window. Inclusive of `start`, exclusive of `end`;
/// when `start` > `end` the window wraps past midnight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuietHours {
    pub start: MinuteOfDay,
    pub end: MinuteOfDay,
}

/// Spend thresholds for bid acceptance and other financial commitments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpendPolicy {
    /// Amounts at or below this are auto-approved.
    pub auto_approve_max: f64,
    /// Amounts above this are blocked outright, not just escalated.
    pub hard_block_above: f64,
}

/// Work-order automation rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkOrderPolicy {
    /// Trade categories eligible for automatic vendor assignment.
    pub auto_assign_categories: Vec<WorkOrderCategory>,
    /// Per-vendor cap on concurrently open work orders.
    pub max_open_per_vendor: u32,
    /// When true, emergency work is never auto-created or auto-assigned.
    pub escalate_emergencies: bool,
}

/// Tenant-messaging automation rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagingPolicy {
    /// Intents the agent may answer without human review.
    pub allowed_auto_intents: Vec<MessageIntent>,
    pub quiet_hours: QuietHours,
    /// When true, any legal-risk language blocks the auto-reply path.
    pub escalate_legal: bool,
}

/// Compliance automation rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompliancePolicy {
    /// Whether the agent may create remediation work orders on its own.
    pub auto_create_tasks: bool,
    /// When true, overdue items always escalate instead of being worked.
    pub escalate_overdue: bool,
    /// Items due within this many days are in scope for a scan.
    pub critical_window_days: i64,
}

/// Where escalations are announced in addition to the Exception record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscalationPolicy {
    pub channels: Vec<String>,
}

/// The full automation policy for one scope. Immutable once resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyConfig {
    pub spend: SpendPolicy,
    pub work_orders: WorkOrderPolicy,
    pub messaging: MessagingPolicy,
    pub compliance: CompliancePolicy,
    pub escalation: EscalationPolicy,
}

impl PolicyConfig {
    /// The compiled-in default policy. Conservative thresholds; every
    /// deployment narrows or widens these through scoped override records.
    pub fn default_policy() -> Self {
        Self {
            spend: SpendPolicy {
                auto_approve_max: 750.0,
                hard_block_above: 5000.0,
            },
            work_orders: WorkOrderPolicy {
                auto_assign_categories: vec![
                    WorkOrderCategory::Plumbing,
                    WorkOrderCategory::Electrical,
                    WorkOrderCategory::Hvac,
                    WorkOrderCategory::Appliance,
                    WorkOrderCategory::General,
                ],
                max_open_per_vendor: 5,
                escalate_emergencies: true,
            },
            messaging: MessagingPolicy {
                allowed_auto_intents: vec![
                    MessageIntent::MaintenanceIntake,
                    MessageIntent::GeneralQuestion,
                    MessageIntent::PaymentQuestion,
                ],
                quiet_hours: QuietHours {
                    start: MinuteOfDay(21 * 60),
                    end: MinuteOfDay(7 * 60),
                },
                escalate_legal: true,
            },
            compliance: CompliancePolicy {
                auto_create_tasks: true,
                escalate_overdue: true,
                critical_window_days: 14,
            },
            escalation: EscalationPolicy {
                channels: vec!["dashboard".to_string(), "email".to_string()],
            },
        }
    }
}

/// Deep-merge a JSON override onto a base config, one top-level section at a
/// time. Non-object input (null, arrays, scalars) means "no override". A
/// section that fails to deserialize after merging falls back to the base
/// section; this function never fails.
pub fn merge_policy(base: &PolicyConfig, overrides: &Value) -> PolicyConfig {
    let patch = match overrides.as_object() {
        Some(map) => map,
        None => return base.clone(),
    };

    PolicyConfig {
        spend: merge_section(&base.spend, patch.get("spend")),
        work_orders: merge_section(&base.work_orders, patch.get("work_orders")),
        messaging: merge_section(&base.messaging, patch.get("messaging")),
        compliance: merge_section(&base.compliance, patch.get("compliance")),
        escalation: merge_section(&base.escalation, patch.get("escalation")),
    }
}

/// Merge one section: overlay the patch object's fields onto the serialized
/// base section, recursing one level into `quiet_hours` so a patch can set
/// just the start or just the end of the window.
fn merge_section<T>(base: &T, patch: Option<&Value>) -> T
where
    T: Serialize + serde::de::DeserializeOwned + Clone,
{
    let patch = match patch.and_then(Value::as_object) {
        Some(map) => map,
        None => return base.clone(),
    };

    // Serializing a config section cannot fail; fall back to the base if it
    // somehow does rather than panicking inside policy resolution.
    let mut merged = match serde_json::to_value(base) {
        Ok(Value::Object(map)) => map,
        _ => return base.clone(),
    };

    for (key, value) in patch {
        match (merged.get_mut(key), value) {
            // quiet_hours is the one nested object we merge field-wise.
            (Some(Value::Object(existing)), Value::Object(incoming)) if key == "quiet_hours" => {
                for (k, v) in incoming {
                    existing.insert(k.clone(), v.clone());
                }
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_else(|_| base.clone())
}
