//! Inline suggestion record and its validity gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::suggestions::patch::char_slice;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    Typo,
    Grammar,
    Wording,
    Tone,
    Formatting,
    Metric,
}

/// Ordering weight: error > warning > suggestion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Suggestion,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TargetSection {
    Summary,
    Experience,
    Education,
    Skills,
    Projects,
    Certifications,
    Volunteer,
    Awards,
    Publications,
}

impl TargetSection {
    pub const ALL: [TargetSection; 9] = [
        TargetSection::Summary,
        TargetSection::Experience,
        TargetSection::Education,
        TargetSection::Skills,
        TargetSection::Projects,
        TargetSection::Certifications,
        TargetSection::Volunteer,
        TargetSection::Awards,
        TargetSection::Publications,
    ];

    /// Key of this section inside the profile object.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetSection::Summary => "summary",
            TargetSection::Experience => "experience",
            TargetSection::Education => "education",
            TargetSection::Skills => "skills",
            TargetSection::Projects => "projects",
            TargetSection::Certifications => "certifications",
            TargetSection::Volunteer => "volunteer",
            TargetSection::Awards => "awards",
            TargetSection::Publications => "publications",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Scan,
    Chat,
    Manual,
}

/// pending → {approved | denied | customized}. Terminal once non-pending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Denied,
    Customized,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Denied => "denied",
            SuggestionStatus::Customized => "customized",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SuggestionStatus::Pending)
    }
}

/// The `(section, item_id, field)` triple locating one mutable string in a profile.
/// Doubles as the scan context handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionContext {
    pub section: TargetSection,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

impl SuggestionContext {
    pub fn new(section: TargetSection, item_id: Option<&str>, field: Option<&str>) -> Self {
        Self {
            section,
            item_id: item_id.map(String::from),
            field: field.map(String::from),
        }
    }

    pub fn is_field(&self, name: &str) -> bool {
        self.field.as_deref() == Some(name)
    }
}

/// A proposed, exactly-addressed text replacement within one profile field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InlineSuggestion {
    pub id: String,
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub severity: Severity,
    pub target_section: TargetSection,
    #[serde(default)]
    pub target_item_id: Option<String>,
    #[serde(default)]
    pub target_field: Option<String>,
    pub original_text: String,
    /// Half-open char range `[start_offset, end_offset)` into the field's current value.
    pub start_offset: usize,
    pub end_offset: usize,
    pub suggested_text: String,
    pub reason: String,
    pub impact: String,
    pub source: SuggestionSource,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub applied_at: Option<DateTime<Utc>>,
}

/// Everything a caller supplies to create a suggestion.
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub suggestion_type: SuggestionType,
    pub severity: Severity,
    pub context: SuggestionContext,
    pub original_text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub suggested_text: String,
    pub reason: String,
    pub impact: String,
    pub source: SuggestionSource,
}

/// Creates a pending suggestion with a fresh id. Offsets are not checked here;
/// the text they point into may not be final yet.
pub fn create_inline_suggestion(params: NewSuggestion) -> InlineSuggestion {
    let NewSuggestion {
        suggestion_type,
        severity,
        context,
        original_text,
        start_offset,
        end_offset,
        suggested_text,
        reason,
        impact,
        source,
    } = params;

    InlineSuggestion {
        id: Uuid::new_v4().to_string(),
        suggestion_type,
        severity,
        target_section: context.section,
        target_item_id: context.item_id,
        target_field: context.field,
        original_text,
        start_offset,
        end_offset,
        suggested_text,
        reason,
        impact,
        source,
        status: SuggestionStatus::Pending,
        created_at: Utc::now(),
        applied_at: None,
    }
}

/// True iff `current_text[start_offset..end_offset] == original_text`.
///
/// Must be evaluated against the field text as it is right before applying;
/// the field may have changed since the suggestion was created.
pub fn is_suggestion_valid(current_text: &str, suggestion: &InlineSuggestion) -> bool {
    char_slice(current_text, suggestion.start_offset, suggestion.end_offset)
        .is_some_and(|slice| slice == suggestion.original_text)
}

impl InlineSuggestion {
    pub fn context(&self) -> SuggestionContext {
        SuggestionContext {
            section: self.target_section,
            item_id: self.target_item_id.clone(),
            field: self.target_field.clone(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SuggestionStatus::Pending
    }

    /// Moves a pending suggestion to a terminal status. Returns `None` when the
    /// suggestion was already resolved; nothing goes back to pending.
    pub fn resolve(&self, status: SuggestionStatus) -> Option<InlineSuggestion> {
        if !self.is_pending() || !status.is_terminal() {
            return None;
        }
        let applied_at = match status {
            SuggestionStatus::Approved | SuggestionStatus::Customized => Some(Utc::now()),
            _ => None,
        };
        Some(InlineSuggestion {
            status,
            applied_at,
            ..self.clone()
        })
    }

    pub fn char_range(&self) -> std::ops::Range<usize> {
        self.start_offset..self.end_offset
    }

    /// Same replacement at the same place, regardless of id, origin or status.
    pub fn same_edit(&self, other: &InlineSuggestion) -> bool {
        self.context() == other.context()
            && self.char_range() == other.char_range()
            && self.original_text == other.original_text
            && self.suggested_text == other.suggested_text
    }

    pub fn overlaps(&self, other: &InlineSuggestion) -> bool {
        // Two insertions at the same point also collide.
        if self.start_offset == other.start_offset {
            return true;
        }
        self.start_offset < other.end_offset && other.start_offset < self.end_offset
    }
}
