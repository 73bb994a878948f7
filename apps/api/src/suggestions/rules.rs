//! Heuristic rule battery: pure `(text, context) -> Vec<InlineSuggestion>` functions.
//!
//! Every table entry or pattern contributes at most one hit, anchored at its first
//! occurrence in the text. Rules do not deduplicate against each other; overlapping
//! hits are resolved downstream by `grouping::resolve_overlaps`.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::suggestions::models::{
    create_inline_suggestion, InlineSuggestion, NewSuggestion, Severity, SuggestionContext,
    SuggestionSource, SuggestionType,
};
use crate::suggestions::patch::{char_len, char_offset};

// ────────────────────────────────────────────────────────────────────────────
// Tables
// ────────────────────────────────────────────────────────────────────────────

const TYPOS: &[(&str, &str)] = &[
    ("Responsable", "Responsible"),
    ("responsable", "responsible"),
    ("recieve", "receive"),
    ("recieved", "received"),
    ("acheive", "achieve"),
    ("acheived", "achieved"),
    ("managment", "management"),
    ("Managment", "Management"),
    ("developement", "development"),
    ("occured", "occurred"),
    ("seperate", "separate"),
    ("sucessful", "successful"),
    ("sucessfully", "successfully"),
    ("experiance", "experience"),
    ("buisness", "business"),
    ("enviroment", "environment"),
    ("profesional", "professional"),
    ("comunication", "communication"),
    ("Comunication", "Communication"),
    ("leadersip", "leadership"),
    ("analysys", "analysis"),
    ("accomodate", "accommodate"),
    ("collegue", "colleague"),
    ("knowlege", "knowledge"),
];

const WEAK_VERBS: &[(&str, &str)] = &[
    ("Responsible for", "Led"),
    ("responsible for", "led"),
    ("Helped with", "Facilitated"),
    ("helped with", "facilitated"),
    ("Worked on", "Developed"),
    ("worked on", "developed"),
    ("Was involved in", "Contributed to"),
    ("Assisted with", "Supported"),
    ("assisted with", "supported"),
    ("Participated in", "Drove"),
    ("Tasked with", "Executed"),
    ("Duties included", "Delivered"),
];

const WORDY_PHRASES: &[(&str, &str)] = &[
    ("In order to", "To"),
    ("in order to", "to"),
    ("due to the fact that", "because"),
    ("a large number of", "many"),
    ("at this point in time", "now"),
    ("for the purpose of", "for"),
    ("in the event that", "if"),
    ("has the ability to", "can"),
    ("on a daily basis", "daily"),
    ("with regard to", "regarding"),
    ("a wide variety of", "various"),
    ("in a timely manner", "promptly"),
];

const INFORMAL_PHRASES: &[(&str, &str)] = &[
    ("a lot of", "extensive"),
    ("lots of", "numerous"),
    ("tons of", "extensive"),
    ("pretty much", "largely"),
    ("kind of", "somewhat"),
    ("stuff", "materials"),
    ("awesome", "excellent"),
    ("gonna", "going to"),
    ("got", "obtained"),
    ("guys", "colleagues"),
];

const PASSIVE_PATTERNS: &[(&str, &str)] = &[
    (r"\b(?:was|were) tasked with\b", "handled"),
    (r"\b(?:was|were) charged with\b", "drove"),
    (r"\b(?:was|were) in charge of\b", "directed"),
    (r"\b(?:was|were) given responsibility for\b", "owned"),
];

/// Marker appended to the first sentence of an unquantified description.
pub const METRIC_PLACEHOLDER: &str = " by [X]%";
const METRIC_MIN_CHARS: usize = 50;
const METRIC_SNIPPET_CHARS: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Compiled patterns
// ────────────────────────────────────────────────────────────────────────────

/// A number other than 1 followed by a singular count noun in a position where the
/// plural is required.
static COUNT_NOUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\b([2-9]|[1-9]\d+)\s+",
        r"(year|month|week|day|hour|engineer|developer|client|customer|member)",
        r"(?:[.,;:!?)]|\s+(?:of|in|at|with|across|on|to|for|experience)\b|$)",
    ))
    .expect("valid count noun regex")
});

static PASSIVE: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    PASSIVE_PATTERNS
        .iter()
        .map(|(pattern, replacement)| {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("valid passive voice regex");
            (re, *replacement)
        })
        .collect()
});

static INFORMAL: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    INFORMAL_PHRASES
        .iter()
        .map(|(phrase, formal)| {
            let re = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(phrase)))
                .case_insensitive(true)
                .build()
                .expect("valid informal phrase regex");
            (re, *formal)
        })
        .collect()
});

const MONTHS: &str = concat!(
    "January|February|March|April|May|June|July|August|September|October|November|December|",
    "Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec",
);

/// A capitalized month, optional year, a range separator, then a lowercase month.
static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    let lower = MONTHS.to_lowercase();
    Regex::new(&format!(
        r"\b(?:{MONTHS})\.?(?:\s+\d{{4}})?\s*(?:-|–|—|to)\s*({lower})\b"
    ))
    .expect("valid date range regex")
});

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

struct Hit<'a> {
    suggestion_type: SuggestionType,
    severity: Severity,
    /// Byte range of the match in the source text.
    byte_start: usize,
    byte_end: usize,
    suggested_text: String,
    reason: String,
    impact: &'a str,
}

fn build(text: &str, ctx: &SuggestionContext, hit: Hit<'_>) -> InlineSuggestion {
    create_inline_suggestion(NewSuggestion {
        suggestion_type: hit.suggestion_type,
        severity: hit.severity,
        context: ctx.clone(),
        original_text: text[hit.byte_start..hit.byte_end].to_string(),
        start_offset: char_offset(text, hit.byte_start),
        end_offset: char_offset(text, hit.byte_end),
        suggested_text: hit.suggested_text,
        reason: hit.reason,
        impact: hit.impact.to_string(),
        source: SuggestionSource::Scan,
    })
}

/// Capitalizes the replacement when the matched text starts with an uppercase letter.
fn match_case(matched: &str, replacement: &str) -> String {
    let starts_upper = matched.chars().next().is_some_and(char::is_uppercase);
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) if starts_upper => first.to_uppercase().chain(chars).collect(),
        _ => replacement.to_string(),
    }
}

fn capitalize(word: &str) -> String {
    match_case("X", word)
}

// ────────────────────────────────────────────────────────────────────────────
// Rules
// ────────────────────────────────────────────────────────────────────────────

/// Exact, case-sensitive misspellings.
pub fn typo_rule(text: &str, ctx: &SuggestionContext) -> Vec<InlineSuggestion> {
    TYPOS
        .iter()
        .filter_map(|(wrong, right)| {
            let start = text.find(wrong)?;
            Some(build(
                text,
                ctx,
                Hit {
                    suggestion_type: SuggestionType::Typo,
                    severity: Severity::Error,
                    byte_start: start,
                    byte_end: start + wrong.len(),
                    suggested_text: right.to_string(),
                    reason: format!("'{wrong}' is misspelled"),
                    impact: "Spelling errors are an easy reason for a recruiter to pass",
                },
            ))
        })
        .collect()
}

/// Bare counts followed by a singular noun.
pub fn grammar_rule(text: &str, ctx: &SuggestionContext) -> Vec<InlineSuggestion> {
    let Some(caps) = COUNT_NOUN.captures(text) else {
        return Vec::new();
    };
    let (Some(number), Some(noun)) = (caps.get(1), caps.get(2)) else {
        return Vec::new();
    };
    vec![build(
        text,
        ctx,
        Hit {
            suggestion_type: SuggestionType::Grammar,
            severity: Severity::Error,
            byte_start: number.start(),
            byte_end: noun.end(),
            suggested_text: format!("{} {}s", number.as_str(), noun.as_str()),
            reason: format!("'{}' should be plural after {}", noun.as_str(), number.as_str()),
            impact: "Grammar slips undermine attention to detail",
        },
    )]
}

pub fn weak_verb_rule(text: &str, ctx: &SuggestionContext) -> Vec<InlineSuggestion> {
    WEAK_VERBS
        .iter()
        .filter_map(|(weak, strong)| {
            let start = text.find(weak)?;
            Some(build(
                text,
                ctx,
                Hit {
                    suggestion_type: SuggestionType::Wording,
                    severity: Severity::Warning,
                    byte_start: start,
                    byte_end: start + weak.len(),
                    suggested_text: strong.to_string(),
                    reason: format!("'{weak}' describes a duty, not an accomplishment"),
                    impact: "Strong action verbs signal ownership",
                },
            ))
        })
        .collect()
}

/// Fires only on `description` fields longer than 50 chars that contain no digit.
pub fn missing_metric_rule(text: &str, ctx: &SuggestionContext) -> Vec<InlineSuggestion> {
    if !ctx.is_field("description")
        || char_len(text) <= METRIC_MIN_CHARS
        || text.chars().any(|c| c.is_ascii_digit())
    {
        return Vec::new();
    }

    let snippet_end = match text.find('.') {
        Some(dot) if !text[..dot].trim().is_empty() => dot,
        _ => text
            .char_indices()
            .nth(METRIC_SNIPPET_CHARS)
            .map(|(b, _)| b)
            .unwrap_or(text.len()),
    };
    let snippet = &text[..snippet_end];

    vec![build(
        text,
        ctx,
        Hit {
            suggestion_type: SuggestionType::Metric,
            severity: Severity::Warning,
            byte_start: 0,
            byte_end: snippet_end,
            suggested_text: format!("{snippet}{METRIC_PLACEHOLDER}"),
            reason: "No quantified outcome in this description".to_string(),
            impact: "Numbers make impact concrete and comparable",
        },
    )]
}

pub fn wordiness_rule(text: &str, ctx: &SuggestionContext) -> Vec<InlineSuggestion> {
    WORDY_PHRASES
        .iter()
        .filter_map(|(wordy, concise)| {
            let start = text.find(wordy)?;
            Some(build(
                text,
                ctx,
                Hit {
                    suggestion_type: SuggestionType::Wording,
                    severity: Severity::Suggestion,
                    byte_start: start,
                    byte_end: start + wordy.len(),
                    suggested_text: concise.to_string(),
                    reason: format!("'{wordy}' can be shortened to '{concise}'"),
                    impact: "Concise bullets are faster to scan",
                },
            ))
        })
        .collect()
}

pub fn passive_voice_rule(text: &str, ctx: &SuggestionContext) -> Vec<InlineSuggestion> {
    PASSIVE
        .iter()
        .filter_map(|(re, active)| {
            let m = re.find(text)?;
            Some(build(
                text,
                ctx,
                Hit {
                    suggestion_type: SuggestionType::Wording,
                    severity: Severity::Suggestion,
                    byte_start: m.start(),
                    byte_end: m.end(),
                    suggested_text: match_case(m.as_str(), active),
                    reason: format!("'{}' is passive voice", m.as_str()),
                    impact: "Active voice puts you in the driver's seat",
                },
            ))
        })
        .collect()
}

/// Informal phrasing, matched case-insensitively on word boundaries.
pub fn tone_rule(text: &str, ctx: &SuggestionContext) -> Vec<InlineSuggestion> {
    INFORMAL
        .iter()
        .filter_map(|(re, formal)| {
            let m = re.find(text)?;
            Some(build(
                text,
                ctx,
                Hit {
                    suggestion_type: SuggestionType::Tone,
                    severity: Severity::Suggestion,
                    byte_start: m.start(),
                    byte_end: m.end(),
                    suggested_text: match_case(m.as_str(), formal),
                    reason: format!("'{}' reads as informal", m.as_str()),
                    impact: "A professional register fits a resume",
                },
            ))
        })
        .collect()
}

/// Month ranges where the closing month is not capitalized like the opening one.
pub fn date_case_rule(text: &str, ctx: &SuggestionContext) -> Vec<InlineSuggestion> {
    let Some(caps) = DATE_RANGE.captures(text) else {
        return Vec::new();
    };
    let (Some(whole), Some(month)) = (caps.get(0), caps.get(1)) else {
        return Vec::new();
    };
    let fixed = format!(
        "{}{}",
        &text[whole.start()..month.start()],
        capitalize(month.as_str())
    );
    vec![build(
        text,
        ctx,
        Hit {
            suggestion_type: SuggestionType::Formatting,
            severity: Severity::Suggestion,
            byte_start: whole.start(),
            byte_end: whole.end(),
            suggested_text: fixed,
            reason: format!("'{}' should be capitalized", month.as_str()),
            impact: "Consistent date formatting looks polished",
        },
    )]
}
