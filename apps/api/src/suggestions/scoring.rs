//! Profile scoring: aggregates heuristic scan results into a per-section quality score.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::suggestions::generator::{scan, SuggestionGenerator};
use crate::suggestions::models::{InlineSuggestion, Severity, TargetSection};
use crate::suggestions::resolver::collect_targets;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueCounts {
    pub errors: usize,
    pub warnings: usize,
    pub suggestions: usize,
}

impl IssueCounts {
    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Suggestion => self.suggestions += 1,
        }
    }

    fn penalty(&self) -> u32 {
        (self.errors * 8 + self.warnings * 4 + self.suggestions) as u32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionScore {
    pub section: TargetSection,
    pub score: u32, // 0 – 100
    pub fields_scanned: usize,
    pub issues: IssueCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileScore {
    pub overall_score: u32, // 0 – 100
    pub sections: Vec<SectionScore>,
    pub missing_sections: Vec<TargetSection>,
    pub issues: IssueCounts,
}

const SECTION_WEIGHTS: &[(TargetSection, f64)] = &[
    (TargetSection::Experience, 0.35),
    (TargetSection::Summary, 0.15),
    (TargetSection::Projects, 0.15),
    (TargetSection::Education, 0.10),
    (TargetSection::Skills, 0.10),
    (TargetSection::Certifications, 0.05),
    (TargetSection::Volunteer, 0.04),
    (TargetSection::Awards, 0.03),
    (TargetSection::Publications, 0.03),
];

/// Runs `generator` over every prose field of the profile, in target order.
pub async fn scan_profile(
    profile: &Value,
    generator: &dyn SuggestionGenerator,
) -> Vec<InlineSuggestion> {
    let mut suggestions = Vec::new();
    for target in collect_targets(profile) {
        suggestions.extend(generator.generate(&target.text, &target.context).await);
    }
    suggestions
}

/// A section has content when its key holds a non-empty string, array, or object.
fn has_content(profile: &Value, section: TargetSection) -> bool {
    match profile.get(section.as_str()) {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        _ => false,
    }
}

pub fn score_profile(profile: &Value) -> ProfileScore {
    let targets = collect_targets(profile);
    let mut sections = Vec::new();
    let mut missing_sections = Vec::new();
    let mut totals = IssueCounts::default();
    let mut weighted_sum = 0.0;
    let mut weight_present = 0.0;

    for &(section, weight) in SECTION_WEIGHTS {
        if !has_content(profile, section) {
            missing_sections.push(section);
            continue;
        }

        let mut issues = IssueCounts::default();
        let mut fields_scanned = 0;
        for target in targets.iter().filter(|t| t.context.section == section) {
            fields_scanned += 1;
            for suggestion in scan(&target.text, &target.context) {
                issues.record(suggestion.severity);
                totals.record(suggestion.severity);
            }
        }

        let score = 100u32.saturating_sub(issues.penalty());
        weighted_sum += score as f64 * weight;
        weight_present += weight;
        sections.push(SectionScore {
            section,
            score,
            fields_scanned,
            issues,
        });
    }

    let overall_score = if weight_present > 0.0 {
        (weighted_sum / weight_present).round().clamp(0.0, 100.0) as u32
    } else {
        0
    };

    ProfileScore {
        overall_score,
        sections,
        missing_sections,
        issues: totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestions::generator::HeuristicGenerator;
    use serde_json::json;

    #[test]
    fn test_empty_profile_scores_zero() {
        let score = score_profile(&json!({}));
        assert_eq!(score.overall_score, 0);
        assert!(score.sections.is_empty());
        assert_eq!(score.missing_sections.len(), SECTION_WEIGHTS.len());
    }

    #[test]
    fn test_clean_profile_scores_full() {
        let profile = json!({
            "summary": { "content": "Backend engineer with 6 years in payments." },
            "experience": [{ "id": "e1", "description": "Cut p99 latency by 40%." }]
        });
        let score = score_profile(&profile);
        assert_eq!(score.overall_score, 100);
        assert_eq!(score.sections.len(), 2);
        assert_eq!(score.issues, IssueCounts::default());
    }

    #[test]
    fn test_penalties_by_severity() {
        let profile = json!({
            "summary": { "content": "I am Responsable for sales." },
            "experience": [{ "id": "e1", "description": "Cut p99 latency by 40%." }]
        });
        let score = score_profile(&profile);
        let summary = score
            .sections
            .iter()
            .find(|s| s.section == TargetSection::Summary)
            .unwrap();
        assert_eq!(summary.issues.errors, 1);
        assert_eq!(summary.score, 92);
        // (100 * .35 + 92 * .15) / .50 = 97.6
        assert_eq!(score.overall_score, 98);
    }

    #[tokio::test]
    async fn test_scan_profile_covers_all_targets() {
        let profile = json!({
            "summary": "I am Responsable for sales.",
            "projects": [{ "id": "p1", "description": "Worked on a CLI." }]
        });
        let found = scan_profile(&profile, &HeuristicGenerator).await;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].target_section, TargetSection::Summary);
        assert_eq!(found[1].target_item_id.as_deref(), Some("p1"));
    }
}
