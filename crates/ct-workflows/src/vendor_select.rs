// vendor_select.rs — Pure vendor ranking and selection.
//
// Separated from the I/O that produces the candidate list so the ranking
// rules and the "first candidate that passes policy" walk are unit-testable
// without a database.

use std::cmp::Ordering;

use uuid::Uuid;

use ct_domain::vendor::Vendor;
use ct_policy::{Decision, PolicyVerdict};

/// Rank candidates by performance score, best first. If a preferred vendor
/// is present in the list it moves to the front regardless of score.
pub fn rank_candidates(mut vendors: Vec<Vendor>, preferred: Option<Uuid>) -> Vec<Vendor> {
    vendors.sort_by(|a, b| {
        b.performance_score
            .partial_cmp(&a.performance_score)
            .unwrap_or(Ordering::Equal)
    });
    if let Some(preferred_id) = preferred {
        if let Some(pos) = vendors.iter().position(|v| v.id == preferred_id) {
            let vendor = vendors.remove(pos);
            vendors.insert(0, vendor);
        }
    }
    vendors
}

/// Walk a ranked candidate list and return the first vendor the policy
/// allows. Candidates with Approval or Block verdicts are skipped, not
/// queued — vendor selection wants an automatic assignment or nothing.
pub fn first_allowed_vendor<'a, E>(
    candidates: &'a [Vendor],
    mut verdict_for: impl FnMut(&Vendor) -> Result<PolicyVerdict, E>,
) -> Result<Option<&'a Vendor>, E> {
    for vendor in candidates {
        if verdict_for(vendor)?.decision == Decision::Allow {
            return Ok(Some(vendor));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_domain::work_order::WorkOrderCategory;
    use std::convert::Infallible;

    fn vendor(name: &str, score: f64) -> Vendor {
        Vendor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
            performance_score: score,
            categories: vec![WorkOrderCategory::Plumbing],
            license_expires_at: None,
            insurance_valid: true,
        }
    }

    fn allow() -> PolicyVerdict {
        PolicyVerdict {
            decision: Decision::Allow,
            reason: "ok".to_string(),
        }
    }

    fn approval() -> PolicyVerdict {
        PolicyVerdict {
            decision: Decision::Approval,
            reason: "at capacity".to_string(),
        }
    }

    #[test]
    fn ranks_by_score_descending() {
        let ranked = rank_candidates(
            vec![vendor("low", 2.0), vendor("high", 4.8), vendor("mid", 3.5)],
            None,
        );
        let names: Vec<&str> = ranked.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
    }

    #[test]
    fn preferred_vendor_jumps_the_queue() {
        let low = vendor("low", 2.0);
        let preferred_id = low.id;
        let ranked = rank_candidates(vec![low, vendor("high", 4.8)], Some(preferred_id));
        assert_eq!(ranked[0].id, preferred_id);
        assert_eq!(ranked[1].name, "high");
    }

    #[test]
    fn unknown_preference_changes_nothing() {
        let ranked = rank_candidates(
            vec![vendor("a", 1.0), vendor("b", 2.0)],
            Some(Uuid::new_v4()),
        );
        assert_eq!(ranked[0].name, "b");
    }

    #[test]
    fn first_allow_wins_over_earlier_approvals() {
        let candidates = vec![vendor("busy", 5.0), vendor("free", 3.0)];
        let free_id = candidates[1].id;

        let chosen = first_allowed_vendor::<Infallible>(&candidates, |v| {
            Ok(if v.id == free_id { allow() } else { approval() })
        })
        .unwrap();
        assert_eq!(chosen.unwrap().id, free_id);
    }

    #[test]
    fn no_allowed_candidate_yields_none() {
        let candidates = vec![vendor("a", 1.0), vendor("b", 2.0)];
        let chosen = first_allowed_vendor::<Infallible>(&candidates, |_| Ok(approval())).unwrap();
        assert!(chosen.is_none());
    }
}
