//! Grouping and prioritization of suggestions for display and batch application.
//!
//! Ordering here is advisory: it decides what is shown first and which of several
//! overlapping suggestions survives into a batch, never whether an edit is correct.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::suggestions::models::{InlineSuggestion, Severity, SuggestionType, TargetSection};

/// Item key used when a suggestion does not target a repeated item.
pub const MAIN_ITEM: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub section: TargetSection,
    pub item_id: String,
    pub field: Option<String>,
}

impl GroupKey {
    pub fn of(suggestion: &InlineSuggestion) -> Self {
        Self {
            section: suggestion.target_section,
            item_id: suggestion
                .target_item_id
                .clone()
                .unwrap_or_else(|| MAIN_ITEM.to_string()),
            field: suggestion.target_field.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionGroup {
    pub key: GroupKey,
    /// Ascending by `start_offset`.
    pub suggestions: Vec<InlineSuggestion>,
}

/// Partitions by `(section, item_id or "main", field)`. Groups appear in the order
/// their first suggestion appears in `list`.
pub fn group_suggestions(list: &[InlineSuggestion]) -> Vec<SuggestionGroup> {
    let mut groups: Vec<SuggestionGroup> = Vec::new();
    let mut index: HashMap<GroupKey, usize> = HashMap::new();

    for suggestion in list {
        let key = GroupKey::of(suggestion);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(SuggestionGroup {
                key,
                suggestions: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].suggestions.push(suggestion.clone());
    }

    for group in &mut groups {
        group.suggestions.sort_by_key(|s| s.start_offset);
    }
    groups
}

/// Severity weight (error 100, warning 50, suggestion 10) plus a type bonus
/// (typo 20, grammar 15, metric 10).
pub fn priority_score(suggestion: &InlineSuggestion) -> u32 {
    let severity = match suggestion.severity {
        Severity::Error => 100,
        Severity::Warning => 50,
        Severity::Suggestion => 10,
    };
    let bonus = match suggestion.suggestion_type {
        SuggestionType::Typo => 20,
        SuggestionType::Grammar => 15,
        SuggestionType::Metric => 10,
        _ => 0,
    };
    severity + bonus
}

/// Descending by priority score; equal scores keep their input order.
pub fn sort_suggestions_by_priority(list: &[InlineSuggestion]) -> Vec<InlineSuggestion> {
    let mut sorted = list.to_vec();
    sorted.sort_by_key(|s| std::cmp::Reverse(priority_score(s)));
    sorted
}

/// Splits suggestions into a mutually non-overlapping set and the rest.
///
/// Within each target field the highest-priority suggestion wins a contested range
/// (ties: lower `start_offset`, then input order). Dropped suggestions stay
/// pending and are expected to be re-scanned once the kept ones are applied.
pub fn resolve_overlaps(
    list: &[InlineSuggestion],
) -> (Vec<InlineSuggestion>, Vec<InlineSuggestion>) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for group in group_suggestions(list) {
        let mut ranked = group.suggestions;
        // group_suggestions already sorted by start_offset; the stable sort keeps
        // that as the tie-breaker.
        ranked.sort_by_key(|s| std::cmp::Reverse(priority_score(s)));

        let mut winners: Vec<InlineSuggestion> = Vec::new();
        for candidate in ranked {
            if winners.iter().any(|w| w.overlaps(&candidate)) {
                dropped.push(candidate);
            } else {
                winners.push(candidate);
            }
        }
        winners.sort_by_key(|s| s.start_offset);
        kept.extend(winners);
    }

    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestions::models::tests::make_suggestion;

    fn graded(
        mut s: InlineSuggestion,
        kind: SuggestionType,
        severity: Severity,
    ) -> InlineSuggestion {
        s.suggestion_type = kind;
        s.severity = severity;
        s
    }

    /// Moves `s` onto an experience item field.
    fn in_item(mut s: InlineSuggestion, item: &str, field: &str) -> InlineSuggestion {
        s.target_section = TargetSection::Experience;
        s.target_item_id = Some(item.to_string());
        s.target_field = Some(field.to_string());
        s
    }

    #[test]
    fn test_priority_scores() {
        let base = make_suggestion("a", "b", 0, 1);
        let typo = graded(base.clone(), SuggestionType::Typo, Severity::Error);
        let metric = graded(base.clone(), SuggestionType::Metric, Severity::Warning);
        let tone = graded(base, SuggestionType::Tone, Severity::Suggestion);
        assert_eq!(priority_score(&typo), 120);
        assert_eq!(priority_score(&metric), 60);
        assert_eq!(priority_score(&tone), 10);
    }

    #[test]
    fn test_sort_by_priority_desc_and_stable() {
        let base = make_suggestion("a", "b", 0, 1);
        let w1 = graded(base.clone(), SuggestionType::Wording, Severity::Warning);
        let e = graded(base.clone(), SuggestionType::Grammar, Severity::Error);
        let w2 = graded(base, SuggestionType::Wording, Severity::Warning);
        let sorted = sort_suggestions_by_priority(&[w1.clone(), e.clone(), w2.clone()]);
        let ids: Vec<_> = sorted.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![e.id.as_str(), w1.id.as_str(), w2.id.as_str()]);
    }

    #[test]
    fn test_group_by_target_and_sort_by_offset() {
        let a = in_item(make_suggestion("x", "y", 10, 11), "e1", "description");
        let b = in_item(make_suggestion("x", "y", 2, 3), "e1", "description");
        let c = make_suggestion("x", "y", 0, 1);
        let groups = group_suggestions(&[a.clone(), c.clone(), b.clone()]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.item_id, "e1");
        assert_eq!(groups[0].suggestions[0].id, b.id);
        assert_eq!(groups[0].suggestions[1].id, a.id);
        assert_eq!(groups[1].key.item_id, MAIN_ITEM);
        assert_eq!(groups[1].suggestions[0].id, c.id);
    }

    #[test]
    fn test_same_item_different_field_are_separate_groups() {
        let a = in_item(make_suggestion("x", "y", 0, 1), "e1", "description");
        let b = in_item(make_suggestion("x", "y", 0, 1), "e1", "achievements[0]");
        assert_eq!(group_suggestions(&[a, b]).len(), 2);
    }

    #[test]
    fn test_resolve_overlaps_keeps_highest_priority() {
        let weak = make_suggestion("Responsible for", "Led", 0, 15);
        let typo = graded(
            make_suggestion("Responsable", "Responsible", 0, 11),
            SuggestionType::Typo,
            Severity::Error,
        );
        let later = graded(
            make_suggestion("in order to", "to", 30, 41),
            SuggestionType::Wording,
            Severity::Suggestion,
        );
        let (kept, dropped) = resolve_overlaps(&[weak.clone(), typo.clone(), later.clone()]);
        let kept_ids: Vec<_> = kept.iter().map(|s| s.id.clone()).collect();
        assert_eq!(kept_ids, vec![typo.id, later.id]);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].id, weak.id);
    }

    #[test]
    fn test_resolve_overlaps_ignores_other_fields() {
        let a = in_item(make_suggestion("abc", "x", 0, 3), "e1", "description");
        let b = in_item(make_suggestion("abc", "x", 0, 3), "e2", "description");
        let (kept, dropped) = resolve_overlaps(&[a, b]);
        assert_eq!(kept.len(), 2);
        assert!(dropped.is_empty());
    }
}
