//! Profile patch resolver: maps a `(section, item_id, field)` triple onto a string
//! inside the nested profile JSON and patches it copy-on-write.
//!
//! The caller's profile is never mutated: every operation clones first and
//! returns the new value.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::suggestions::models::{InlineSuggestion, SuggestionContext, TargetSection};
use crate::suggestions::patch::apply_suggestion;

// ────────────────────────────────────────────────────────────────────────────
// Section layout table
// ────────────────────────────────────────────────────────────────────────────

/// How a section is stored in the profile object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionLayout {
    /// One object (or bare string) under `key`.
    Single {
        key: &'static str,
        default_field: &'static str,
    },
    /// Ordered list of items carrying a stable `id`.
    List {
        key: &'static str,
        default_field: &'static str,
    },
    /// Map keyed by category name.
    Keyed { key: &'static str },
}

pub fn section_layout(section: TargetSection) -> SectionLayout {
    match section {
        TargetSection::Summary => SectionLayout::Single {
            key: "summary",
            default_field: "content",
        },
        TargetSection::Skills => SectionLayout::Keyed { key: "skills" },
        list => SectionLayout::List {
            key: list.as_str(),
            default_field: "description",
        },
    }
}

/// Array fields of list items that hold prose worth scanning.
const PROSE_ARRAY_FIELDS: &[&str] = &["achievements", "highlights"];

// ────────────────────────────────────────────────────────────────────────────
// Field path grammar: `name`, `name[index]`, `[index]`
// ────────────────────────────────────────────────────────────────────────────

static FIELD_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)?(?:\[(\d+)\])?$").expect("valid field path regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub name: Option<String>,
    pub index: Option<usize>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldPathError {
    #[error("unrecognized field path '{0}'")]
    Unrecognized(String),
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, FieldPathError> {
        let unrecognized = || FieldPathError::Unrecognized(raw.to_string());
        let caps = FIELD_PATH.captures(raw).ok_or_else(unrecognized)?;
        let name = caps.get(1).map(|m| m.as_str().to_string());
        let index = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<usize>().map_err(|_| unrecognized())?),
            None => None,
        };
        if name.is_none() && index.is_none() {
            return Err(unrecognized());
        }
        Ok(FieldPath { name, index })
    }

    fn named(name: &str) -> Self {
        FieldPath {
            name: Some(name.to_string()),
            index: None,
        }
    }

    fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let value = match &self.name {
            Some(name) => value.as_object()?.get(name)?,
            None => value,
        };
        match self.index {
            Some(i) => value.as_array()?.get(i),
            None => Some(value),
        }
    }

    fn get_mut<'a>(&self, value: &'a mut Value) -> Option<&'a mut Value> {
        let value = match &self.name {
            Some(name) => value.as_object_mut()?.get_mut(name)?,
            None => value,
        };
        match self.index {
            Some(i) => value.as_array_mut()?.get_mut(i),
            None => Some(value),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resolution
// ────────────────────────────────────────────────────────────────────────────

/// Field path to follow inside the located item, or `None` to target the item itself.
fn field_path(layout: SectionLayout, field: Option<&str>) -> Option<Option<FieldPath>> {
    match (field, layout) {
        (Some(raw), _) => FieldPath::parse(raw).ok().map(Some),
        (None, SectionLayout::List { default_field, .. }) => {
            Some(Some(FieldPath::named(default_field)))
        }
        (None, _) => Some(None),
    }
}

fn locate<'a>(profile: &'a Value, target: &SuggestionContext) -> Option<&'a Value> {
    let layout = section_layout(target.section);
    let path = field_path(layout, target.field.as_deref())?;

    let item = match layout {
        SectionLayout::Single { key, default_field } => {
            let section = profile.get(key)?;
            match (&path, section) {
                (None, Value::String(_)) => return Some(section),
                (None, _) => return section.get(default_field),
                _ => section,
            }
        }
        SectionLayout::List { key, .. } => {
            let wanted = target.item_id.as_deref()?;
            profile
                .get(key)?
                .as_array()?
                .iter()
                .find(|item| item_id(item) == Some(wanted))?
        }
        SectionLayout::Keyed { key } => profile.get(key)?.get(target.item_id.as_deref()?)?,
    };

    match path {
        Some(p) => p.get(item),
        None => Some(item),
    }
}

fn locate_mut<'a>(profile: &'a mut Value, target: &SuggestionContext) -> Option<&'a mut Value> {
    let layout = section_layout(target.section);
    let path = field_path(layout, target.field.as_deref())?;

    let item = match layout {
        SectionLayout::Single { key, default_field } => {
            let section = profile.get_mut(key)?;
            match path {
                None if section.is_string() => return Some(section),
                None => return section.get_mut(default_field),
                Some(_) => section,
            }
        }
        SectionLayout::List { key, .. } => {
            let wanted = target.item_id.as_deref()?;
            profile
                .get_mut(key)?
                .as_array_mut()?
                .iter_mut()
                .find(|item| item_id(item) == Some(wanted))?
        }
        SectionLayout::Keyed { key } => profile
            .get_mut(key)?
            .get_mut(target.item_id.as_deref()?)?,
    };

    match path {
        Some(p) => p.get_mut(item),
        None => Some(item),
    }
}

fn item_id(item: &Value) -> Option<&str> {
    item.get("id").and_then(Value::as_str)
}

/// Current string value at a target, or `None` when it does not resolve to a string.
pub fn resolve_field_text<'a>(profile: &'a Value, target: &SuggestionContext) -> Option<&'a str> {
    locate(profile, target)?.as_str()
}

/// Spells `target` the one way every equivalent triple resolves: the section's
/// default field is made explicit wherever the resolver would fall back to it.
/// Returns `None` when the target does not resolve to a string.
pub fn canonical_target(profile: &Value, target: &SuggestionContext) -> Option<SuggestionContext> {
    resolve_field_text(profile, target)?;
    let field = match (section_layout(target.section), target.field.as_deref()) {
        (SectionLayout::List { default_field, .. }, None) => Some(default_field.to_string()),
        // A bare-string summary has no default field to name.
        (SectionLayout::Single { key, default_field }, None)
            if profile.get(key).is_some_and(Value::is_object) =>
        {
            Some(default_field.to_string())
        }
        (_, field) => field.map(String::from),
    };
    Some(SuggestionContext {
        field,
        ..target.clone()
    })
}

/// Returns a copy of `profile` with `new_text` written at `target`, or `None` when
/// the target does not resolve to a string.
pub fn write_field_text(
    profile: &Value,
    target: &SuggestionContext,
    new_text: String,
) -> Option<Value> {
    let mut copy = profile.clone();
    let slot = locate_mut(&mut copy, target)?;
    if !slot.is_string() {
        return None;
    }
    *slot = Value::String(new_text);
    Some(copy)
}

/// Applies a suggestion to the field it targets and returns the new profile.
///
/// Unresolvable targets are a no-op: the returned value is an unchanged copy.
/// No validity check happens here; use `review::review_suggestion` for the gated path.
pub fn apply_suggestion_to_profile(profile: &Value, suggestion: &InlineSuggestion) -> Value {
    let target = suggestion.context();
    resolve_field_text(profile, &target)
        .map(|text| apply_suggestion(text, suggestion))
        .and_then(|patched| write_field_text(profile, &target, patched))
        .unwrap_or_else(|| profile.clone())
}

// ────────────────────────────────────────────────────────────────────────────
// Target enumeration
// ────────────────────────────────────────────────────────────────────────────

/// A scannable prose field and its current text.
#[derive(Debug, Clone, Serialize)]
pub struct FieldTarget {
    pub context: SuggestionContext,
    pub text: String,
}

/// Enumerates every prose field in the profile: summary content, each list item's
/// `description`, and each string of its `achievements`/`highlights` arrays.
/// Items without an `id` cannot be addressed and are skipped.
pub fn collect_targets(profile: &Value) -> Vec<FieldTarget> {
    let mut targets = Vec::new();

    for section in TargetSection::ALL {
        match section_layout(section) {
            SectionLayout::Single { .. } => {
                let ctx = SuggestionContext::new(section, None, None);
                if let Some(text) = resolve_field_text(profile, &ctx) {
                    targets.push(FieldTarget {
                        context: ctx,
                        text: text.to_string(),
                    });
                }
            }
            SectionLayout::List { key, default_field } => {
                let Some(items) = profile.get(key).and_then(Value::as_array) else {
                    continue;
                };
                for item in items {
                    let Some(id) = item_id(item) else {
                        continue;
                    };
                    if let Some(text) = item.get(default_field).and_then(Value::as_str) {
                        targets.push(FieldTarget {
                            context: SuggestionContext::new(section, Some(id), Some(default_field)),
                            text: text.to_string(),
                        });
                    }
                    for &array_field in PROSE_ARRAY_FIELDS {
                        let Some(entries) = item.get(array_field).and_then(Value::as_array) else {
                            continue;
                        };
                        for (i, entry) in entries.iter().enumerate() {
                            if let Some(text) = entry.as_str() {
                                let field = format!("{array_field}[{i}]");
                                targets.push(FieldTarget {
                                    context: SuggestionContext::new(
                                        section,
                                        Some(id),
                                        Some(&field),
                                    ),
                                    text: text.to_string(),
                                });
                            }
                        }
                    }
                }
            }
            // Skill names are short labels, not prose.
            SectionLayout::Keyed { .. } => {}
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestions::models::tests::make_suggestion;
    use serde_json::json;

    fn sample_profile() -> Value {
        json!({
            "summary": { "content": "Engineer with a lot of experience." },
            "experience": [
                {
                    "id": "e1",
                    "company": "Acme",
                    "description": "Responsible for testing.",
                    "achievements": ["Shipped v1", "Cut costs in order to grow"]
                },
                { "id": "e2", "description": "Built APIs." }
            ],
            "projects": [{ "id": "p1", "description": "A CLI tool." }],
            "education": [{ "id": "ed1", "description": "Studied maths." }],
            "skills": {
                "Languages": ["Rust", "Pyhton"],
                "Soft": "Comunication"
            }
        })
    }

    fn targeted(
        section: TargetSection,
        item: Option<&str>,
        field: Option<&str>,
        original: &str,
        suggested: &str,
        start: usize,
        end: usize,
    ) -> InlineSuggestion {
        let mut s = make_suggestion(original, suggested, start, end);
        s.target_section = section;
        s.target_item_id = item.map(String::from);
        s.target_field = field.map(String::from);
        s
    }

    #[test]
    fn test_field_path_grammar() {
        assert_eq!(FieldPath::parse("description").unwrap(), FieldPath::named("description"));
        assert_eq!(
            FieldPath::parse("achievements[2]").unwrap(),
            FieldPath {
                name: Some("achievements".to_string()),
                index: Some(2)
            }
        );
        assert_eq!(
            FieldPath::parse("[1]").unwrap(),
            FieldPath {
                name: None,
                index: Some(1)
            }
        );
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a.b").is_err());
        assert!(FieldPath::parse("achievements[-1]").is_err());
    }

    #[test]
    fn test_experience_description_patch_is_copy_on_write() {
        let profile = json!({
            "experience": [{ "id": "e1", "description": "Responsible for testing." }]
        });
        let s = targeted(
            TargetSection::Experience,
            Some("e1"),
            Some("description"),
            "Responsible for",
            "Led",
            0,
            15,
        );
        let patched = apply_suggestion_to_profile(&profile, &s);
        assert_eq!(patched["experience"][0]["description"], "Led testing.");
        assert_eq!(profile["experience"][0]["description"], "Responsible for testing.");
    }

    #[test]
    fn test_unknown_item_returns_equal_copy() {
        let profile = sample_profile();
        let s = targeted(
            TargetSection::Experience,
            Some("missing"),
            Some("description"),
            "Responsible for",
            "Led",
            0,
            15,
        );
        let patched = apply_suggestion_to_profile(&profile, &s);
        assert_eq!(patched, profile);
    }

    #[test]
    fn test_unrecognized_field_is_noop() {
        let profile = sample_profile();
        let s = targeted(
            TargetSection::Experience,
            Some("e1"),
            Some("achievements.0"),
            "Shipped",
            "Launched",
            0,
            7,
        );
        assert_eq!(apply_suggestion_to_profile(&profile, &s), profile);
    }

    #[test]
    fn test_achievement_element_patch() {
        let profile = sample_profile();
        let s = targeted(
            TargetSection::Experience,
            Some("e1"),
            Some("achievements[1]"),
            "in order to",
            "to",
            10,
            21,
        );
        let patched = apply_suggestion_to_profile(&profile, &s);
        assert_eq!(patched["experience"][0]["achievements"][1], "Cut costs to grow");
        assert_eq!(patched["experience"][0]["achievements"][0], "Shipped v1");
    }

    #[test]
    fn test_summary_object_and_bare_string() {
        let profile = sample_profile();
        let s = targeted(TargetSection::Summary, None, None, "a lot of", "extensive", 14, 22);
        let patched = apply_suggestion_to_profile(&profile, &s);
        assert_eq!(patched["summary"]["content"], "Engineer with extensive experience.");

        let bare = json!({ "summary": "Engineer with a lot of experience." });
        let patched = apply_suggestion_to_profile(&bare, &s);
        assert_eq!(patched["summary"], "Engineer with extensive experience.");
    }

    #[test]
    fn test_generalized_sections_resolve() {
        let profile = sample_profile();
        let edu = SuggestionContext::new(TargetSection::Education, Some("ed1"), None);
        assert_eq!(resolve_field_text(&profile, &edu), Some("Studied maths."));

        let proj =
            SuggestionContext::new(TargetSection::Projects, Some("p1"), Some("description"));
        assert_eq!(resolve_field_text(&profile, &proj), Some("A CLI tool."));
    }

    #[test]
    fn test_skills_keyed_by_category() {
        let profile = sample_profile();
        let s = targeted(
            TargetSection::Skills,
            Some("Languages"),
            Some("[1]"),
            "Pyhton",
            "Python",
            0,
            6,
        );
        let patched = apply_suggestion_to_profile(&profile, &s);
        assert_eq!(patched["skills"]["Languages"], json!(["Rust", "Python"]));

        let s = targeted(
            TargetSection::Skills,
            Some("Soft"),
            None,
            "Comunication",
            "Communication",
            0,
            12,
        );
        let patched = apply_suggestion_to_profile(&profile, &s);
        assert_eq!(patched["skills"]["Soft"], "Communication");
    }

    #[test]
    fn test_canonical_target_names_default_field() {
        let profile = sample_profile();
        let implicit = SuggestionContext::new(TargetSection::Experience, Some("e1"), None);
        let explicit =
            SuggestionContext::new(TargetSection::Experience, Some("e1"), Some("description"));
        assert_eq!(canonical_target(&profile, &implicit), Some(explicit.clone()));
        assert_eq!(canonical_target(&profile, &explicit), Some(explicit));

        let summary = SuggestionContext::new(TargetSection::Summary, None, None);
        let content = SuggestionContext::new(TargetSection::Summary, None, Some("content"));
        assert_eq!(canonical_target(&profile, &summary), Some(content));

        let bare = json!({ "summary": "Engineer." });
        assert_eq!(canonical_target(&bare, &summary), Some(summary.clone()));

        let missing = SuggestionContext::new(TargetSection::Experience, Some("nope"), None);
        assert_eq!(canonical_target(&profile, &missing), None);
    }

    #[test]
    fn test_non_string_target_is_unresolvable() {
        let profile = sample_profile();
        let ctx =
            SuggestionContext::new(TargetSection::Experience, Some("e1"), Some("achievements"));
        assert_eq!(resolve_field_text(&profile, &ctx), None);
        assert!(write_field_text(&profile, &ctx, "x".to_string()).is_none());
    }

    #[test]
    fn test_collect_targets_enumerates_prose_fields() {
        let targets = collect_targets(&sample_profile());
        let fields: Vec<(TargetSection, Option<&str>, Option<&str>)> = targets
            .iter()
            .map(|t| {
                (
                    t.context.section,
                    t.context.item_id.as_deref(),
                    t.context.field.as_deref(),
                )
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                (TargetSection::Summary, None, None),
                (TargetSection::Experience, Some("e1"), Some("description")),
                (TargetSection::Experience, Some("e1"), Some("achievements[0]")),
                (TargetSection::Experience, Some("e1"), Some("achievements[1]")),
                (TargetSection::Experience, Some("e2"), Some("description")),
                (TargetSection::Education, Some("ed1"), Some("description")),
                (TargetSection::Projects, Some("p1"), Some("description")),
            ]
        );
        // Every enumerated target resolves back to the same text.
        let profile = sample_profile();
        for t in &targets {
            assert_eq!(resolve_field_text(&profile, &t.context), Some(t.text.as_str()));
        }
    }
}
