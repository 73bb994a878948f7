//! Review lifecycle: turns a user decision on a pending suggestion into a new
//! profile value and a terminal status.
//!
//! All failures are values. A stale or unresolvable suggestion means "not applied",
//! never a reason to abort a wider batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::suggestions::grouping::{group_suggestions, resolve_overlaps};
use crate::suggestions::models::{is_suggestion_valid, InlineSuggestion, SuggestionStatus};
use crate::suggestions::patch::{apply_batch, SkipReason, SkippedSuggestion};
use crate::suggestions::resolver::{
    apply_suggestion_to_profile, canonical_target, resolve_field_text, write_field_text,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Deny,
    Customize { replacement: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ReviewError {
    #[error("Suggestion already {}", .0.as_str())]
    AlreadyResolved(SuggestionStatus),

    #[error("Cannot apply suggestion: the text has changed")]
    Stale,

    #[error("Cannot apply suggestion: its target no longer exists")]
    Unresolvable,
}

/// Result of a successful review.
#[derive(Debug, Clone)]
pub struct Reviewed {
    /// New profile value; equal to the input when nothing was applied.
    pub profile: Value,
    /// The suggestion in its terminal status.
    pub suggestion: InlineSuggestion,
    pub profile_changed: bool,
}

/// Applies a user decision to a pending suggestion.
///
/// Approve and customize revalidate the suggestion against the field's current
/// text immediately before patching. Deny never touches the profile.
pub fn review_suggestion(
    profile: &Value,
    suggestion: &InlineSuggestion,
    decision: &ReviewDecision,
) -> Result<Reviewed, ReviewError> {
    if !suggestion.is_pending() {
        return Err(ReviewError::AlreadyResolved(suggestion.status));
    }

    let (status, replacement) = match decision {
        ReviewDecision::Deny => {
            let denied = suggestion
                .resolve(SuggestionStatus::Denied)
                .ok_or(ReviewError::AlreadyResolved(suggestion.status))?;
            debug!("Suggestion {} denied", suggestion.id);
            return Ok(Reviewed {
                profile: profile.clone(),
                suggestion: denied,
                profile_changed: false,
            });
        }
        ReviewDecision::Approve => (SuggestionStatus::Approved, None),
        ReviewDecision::Customize { replacement } => {
            (SuggestionStatus::Customized, Some(replacement.clone()))
        }
    };

    let current = resolve_field_text(profile, &suggestion.context())
        .ok_or(ReviewError::Unresolvable)?;
    if !is_suggestion_valid(current, suggestion) {
        return Err(ReviewError::Stale);
    }

    let effective = InlineSuggestion {
        suggested_text: replacement.unwrap_or_else(|| suggestion.suggested_text.clone()),
        ..suggestion.clone()
    };
    let patched = apply_suggestion_to_profile(profile, &effective);
    let resolved = effective
        .resolve(status)
        .ok_or(ReviewError::AlreadyResolved(suggestion.status))?;

    info!(
        "Suggestion {} {} on {}",
        resolved.id,
        resolved.status.as_str(),
        resolved.target_section.as_str()
    );

    Ok(Reviewed {
        profile: patched,
        suggestion: resolved,
        profile_changed: true,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Batch application across the whole profile
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Suggestions that were applied, now `approved`.
    pub applied: Vec<InlineSuggestion>,
    pub skipped: Vec<SkippedSuggestion>,
}

/// Approves every pending suggestion that can be applied safely.
///
/// Targets are canonicalized first so every spelling of one field lands in one
/// group. Overlaps are then resolved by priority and each target field is patched
/// with `apply_batch`. Unresolvable targets are reported and skipped.
pub fn apply_suggestions_to_profile(
    profile: &Value,
    suggestions: &[InlineSuggestion],
) -> (Value, BatchReport) {
    let mut skipped = Vec::new();
    let mut canonical = Vec::new();

    for s in suggestions {
        if !s.is_pending() {
            skipped.push(SkippedSuggestion {
                id: s.id.clone(),
                reason: SkipReason::AlreadyResolved,
            });
            continue;
        }
        match canonical_target(profile, &s.context()) {
            Some(target) => canonical.push(InlineSuggestion {
                target_field: target.field,
                ..s.clone()
            }),
            None => skipped.push(SkippedSuggestion {
                id: s.id.clone(),
                reason: SkipReason::Unresolvable,
            }),
        }
    }

    let (kept, dropped) = resolve_overlaps(&canonical);
    skipped.extend(dropped.into_iter().map(|s| SkippedSuggestion {
        id: s.id,
        reason: SkipReason::Overlap,
    }));

    let mut current = profile.clone();
    let mut applied_ids: Vec<String> = Vec::new();

    for group in group_suggestions(&kept) {
        let target = group.suggestions[0].context();
        let Some(text) = resolve_field_text(&current, &target) else {
            skipped.extend(group.suggestions.iter().map(|s| SkippedSuggestion {
                id: s.id.clone(),
                reason: SkipReason::Unresolvable,
            }));
            continue;
        };

        let result = apply_batch(text, &group.suggestions);
        skipped.extend(result.skipped);
        if result.applied.is_empty() {
            continue;
        }

        if let Some(next) = write_field_text(&current, &target, result.text) {
            current = next;
        }
        applied_ids.extend(result.applied);
    }

    // Reported in caller order with the target the caller stored.
    let applied: Vec<InlineSuggestion> = suggestions
        .iter()
        .filter(|s| applied_ids.contains(&s.id))
        .filter_map(|s| s.resolve(SuggestionStatus::Approved))
        .collect();

    info!(
        "Batch applied {} suggestion(s), skipped {}",
        applied.len(),
        skipped.len()
    );
    (current, BatchReport { applied, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestions::generator::scan;
    use crate::suggestions::models::{SuggestionContext, TargetSection};
    use serde_json::json;

    fn profile() -> Value {
        json!({
            "summary": { "content": "I am Responsable for sales." },
            "experience": [
                { "id": "e1", "description": "Responsible for testing in order to ship." }
            ]
        })
    }

    fn summary_typo() -> InlineSuggestion {
        let ctx = SuggestionContext::new(TargetSection::Summary, None, None);
        scan("I am Responsable for sales.", &ctx).remove(0)
    }

    #[test]
    fn test_approve_applies_and_resolves() {
        let p = profile();
        let reviewed = review_suggestion(&p, &summary_typo(), &ReviewDecision::Approve).unwrap();
        assert_eq!(reviewed.profile["summary"]["content"], "I am Responsible for sales.");
        assert_eq!(reviewed.suggestion.status, SuggestionStatus::Approved);
        assert!(reviewed.suggestion.applied_at.is_some());
        assert!(reviewed.profile_changed);
        assert_eq!(p["summary"]["content"], "I am Responsable for sales.");
    }

    #[test]
    fn test_deny_leaves_profile_and_blocks_later_apply() {
        let p = profile();
        let reviewed = review_suggestion(&p, &summary_typo(), &ReviewDecision::Deny).unwrap();
        assert_eq!(reviewed.profile, p);
        assert!(!reviewed.profile_changed);
        assert_eq!(reviewed.suggestion.status, SuggestionStatus::Denied);

        let again = review_suggestion(&p, &reviewed.suggestion, &ReviewDecision::Approve);
        assert_eq!(
            again.unwrap_err(),
            ReviewError::AlreadyResolved(SuggestionStatus::Denied)
        );
    }

    #[test]
    fn test_no_double_apply() {
        let p = profile();
        let first = review_suggestion(&p, &summary_typo(), &ReviewDecision::Approve).unwrap();
        let second =
            review_suggestion(&first.profile, &first.suggestion, &ReviewDecision::Approve);
        assert!(matches!(second, Err(ReviewError::AlreadyResolved(_))));
    }

    #[test]
    fn test_customize_uses_user_text() {
        let reviewed = review_suggestion(
            &profile(),
            &summary_typo(),
            &ReviewDecision::Customize {
                replacement: "accountable".to_string(),
            },
        )
        .unwrap();
        assert_eq!(reviewed.profile["summary"]["content"], "I am accountable for sales.");
        assert_eq!(reviewed.suggestion.status, SuggestionStatus::Customized);
        assert_eq!(reviewed.suggestion.suggested_text, "accountable");
    }

    #[test]
    fn test_stale_is_rejected() {
        let mut p = profile();
        p["summary"]["content"] = json!("Sales lead. I am Responsable for sales.");
        let result = review_suggestion(&p, &summary_typo(), &ReviewDecision::Approve);
        assert_eq!(result.unwrap_err(), ReviewError::Stale);
    }

    #[test]
    fn test_unresolvable_is_rejected() {
        let mut s = summary_typo();
        s.target_section = TargetSection::Experience;
        s.target_item_id = Some("nope".to_string());
        let result = review_suggestion(&profile(), &s, &ReviewDecision::Approve);
        assert_eq!(result.unwrap_err(), ReviewError::Unresolvable);
    }

    #[test]
    fn test_decision_serde() {
        let d: ReviewDecision =
            serde_json::from_value(json!({"decision": "customize", "replacement": "x"})).unwrap();
        assert_eq!(
            d,
            ReviewDecision::Customize {
                replacement: "x".to_string()
            }
        );
        let d: ReviewDecision = serde_json::from_value(json!({"decision": "deny"})).unwrap();
        assert_eq!(d, ReviewDecision::Deny);
    }

    #[test]
    fn test_batch_applies_across_fields_and_reports_skips() {
        let p = profile();
        let summary_ctx = SuggestionContext::new(TargetSection::Summary, None, None);
        let exp_ctx =
            SuggestionContext::new(TargetSection::Experience, Some("e1"), Some("description"));
        let mut all = scan("I am Responsable for sales.", &summary_ctx);
        all.extend(scan("Responsible for testing in order to ship.", &exp_ctx));

        let mut orphan = all[0].clone();
        orphan.id = "orphan".to_string();
        orphan.target_section = TargetSection::Projects;
        orphan.target_item_id = Some("p9".to_string());
        all.push(orphan);

        let (patched, report) = apply_suggestions_to_profile(&p, &all);
        assert_eq!(patched["summary"]["content"], "I am Responsible for sales.");
        assert_eq!(patched["experience"][0]["description"], "Led testing to ship.");
        assert_eq!(report.applied.len(), 3);
        assert!(report
            .applied
            .iter()
            .all(|s| s.status == SuggestionStatus::Approved));
        assert_eq!(
            report.skipped,
            vec![SkippedSuggestion {
                id: "orphan".to_string(),
                reason: SkipReason::Unresolvable
            }]
        );
        assert_eq!(p, profile());
    }

    #[test]
    fn test_batch_groups_default_and_explicit_field_together() {
        let p = json!({
            "experience": [
                { "id": "e1", "description": "Responsible for testing in order to ship." }
            ]
        });
        let implicit = SuggestionContext::new(TargetSection::Experience, Some("e1"), None);
        let mut found = scan("Responsible for testing in order to ship.", &implicit);
        assert_eq!(found.len(), 2);
        let concise_at = found
            .iter()
            .position(|s| s.original_text == "in order to")
            .unwrap();
        let mut concise = found.remove(concise_at);
        concise.target_field = Some("description".to_string());
        let lead = found.remove(0);
        assert_eq!(lead.target_field, None);

        let (patched, report) =
            apply_suggestions_to_profile(&p, &[lead.clone(), concise.clone()]);
        assert_eq!(patched["experience"][0]["description"], "Led testing to ship.");
        assert!(report.skipped.is_empty());
        let ids: Vec<&str> = report.applied.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![lead.id.as_str(), concise.id.as_str()]);
        assert_eq!(report.applied[0].target_field, None);
        assert_eq!(report.applied[1].target_field.as_deref(), Some("description"));
    }
}
