//! Suggestion generation: the heuristic scan plus a pluggable AI-backed variant.
//!
//! `AppState` holds an `Arc<dyn SuggestionGenerator>`, chosen at startup from config.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::llm_client::prompts::{JSON_ARRAY_ONLY_SYSTEM, VERBATIM_INSTRUCTION};
use crate::llm_client::{strip_json_fences, CompletionProvider};
use crate::suggestions::models::{
    create_inline_suggestion, is_suggestion_valid, InlineSuggestion, NewSuggestion, Severity,
    SuggestionContext, SuggestionSource, SuggestionType,
};
use crate::suggestions::patch::{char_len, char_offset};
use crate::suggestions::prompts::{AI_SUGGESTION_PROMPT_TEMPLATE, AI_SUGGESTION_SYSTEM};
use crate::suggestions::rules;

// ────────────────────────────────────────────────────────────────────────────
// Heuristic scan
// ────────────────────────────────────────────────────────────────────────────

pub type Rule = fn(&str, &SuggestionContext) -> Vec<InlineSuggestion>;

/// Rule battery in execution order. Output order follows this list.
pub const RULES: &[(&str, Rule)] = &[
    ("typos", rules::typo_rule),
    ("grammar", rules::grammar_rule),
    ("weak_verbs", rules::weak_verb_rule),
    ("missing_metrics", rules::missing_metric_rule),
    ("wordiness", rules::wordiness_rule),
    ("passive_voice", rules::passive_voice_rule),
    ("tone", rules::tone_rule),
    ("date_case", rules::date_case_rule),
];

/// Runs every rule over `text` and concatenates the hits. Deterministic apart from
/// the generated ids and timestamps.
pub fn scan(text: &str, context: &SuggestionContext) -> Vec<InlineSuggestion> {
    let mut suggestions = Vec::new();
    for (name, rule) in RULES {
        let hits = rule(text, context);
        if !hits.is_empty() {
            debug!("Rule '{name}' produced {} suggestion(s)", hits.len());
        }
        suggestions.extend(hits);
    }
    suggestions
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Produces suggestions for one field. Implementations never fail: anything that
/// goes wrong degrades to fewer suggestions.
#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn generate(&self, text: &str, context: &SuggestionContext) -> Vec<InlineSuggestion>;

    /// "heuristic" or "ai"; reported back to clients.
    fn backend(&self) -> &'static str;
}

pub struct HeuristicGenerator;

#[async_trait]
impl SuggestionGenerator for HeuristicGenerator {
    async fn generate(&self, text: &str, context: &SuggestionContext) -> Vec<InlineSuggestion> {
        scan(text, context)
    }

    fn backend(&self) -> &'static str {
        "heuristic"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AI-backed generator
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one AI round-trip, modelled as a value instead of an exception.
#[derive(Debug)]
pub enum AiSuggestions {
    Suggestions(Vec<InlineSuggestion>),
    Unavailable(String),
}

/// Shape the model is asked to return for each suggestion.
#[derive(Debug, Deserialize)]
struct RawAiSuggestion {
    #[serde(rename = "type")]
    suggestion_type: SuggestionType,
    severity: Severity,
    original_text: String,
    suggested_text: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    impact: String,
    #[serde(default)]
    start_offset: Option<usize>,
    #[serde(default)]
    end_offset: Option<usize>,
}

pub struct AiSuggestionGenerator<P> {
    provider: P,
    /// When the AI is unavailable: fall back to the heuristic scan, or return nothing.
    fallback_to_heuristic: bool,
}

impl<P: CompletionProvider> AiSuggestionGenerator<P> {
    pub fn new(provider: P, fallback_to_heuristic: bool) -> Self {
        Self {
            provider,
            fallback_to_heuristic,
        }
    }
}

#[async_trait]
impl<P: CompletionProvider> SuggestionGenerator for AiSuggestionGenerator<P> {
    async fn generate(&self, text: &str, context: &SuggestionContext) -> Vec<InlineSuggestion> {
        match generate_ai_suggestions(&self.provider, text, context).await {
            AiSuggestions::Suggestions(suggestions) => suggestions,
            AiSuggestions::Unavailable(reason) if self.fallback_to_heuristic => {
                warn!("AI suggestions unavailable ({reason}); falling back to heuristic scan");
                scan(text, context)
            }
            AiSuggestions::Unavailable(reason) => {
                warn!("AI suggestions unavailable ({reason}); returning none");
                Vec::new()
            }
        }
    }

    fn backend(&self) -> &'static str {
        "ai"
    }
}

/// Asks the completion provider for suggestions on `text` and maps the JSON array
/// it returns into pending suggestions.
pub async fn generate_ai_suggestions<P: CompletionProvider + ?Sized>(
    provider: &P,
    text: &str,
    context: &SuggestionContext,
) -> AiSuggestions {
    let prompt = AI_SUGGESTION_PROMPT_TEMPLATE
        .replace("{section}", context.section.as_str())
        .replace("{field}", context.field.as_deref().unwrap_or("content"))
        .replace("{verbatim_instruction}", VERBATIM_INSTRUCTION)
        .replace("{text}", text);
    let system = format!("{JSON_ARRAY_ONLY_SYSTEM} {AI_SUGGESTION_SYSTEM}");

    match provider.complete(&prompt, &system).await {
        Ok(raw) => parse_ai_suggestions(&raw, text, context),
        Err(e) => AiSuggestions::Unavailable(format!("completion failed: {e}")),
    }
}

/// Parses a model response. A non-array response is `Unavailable`; individual
/// items that do not fit the schema or cannot be located in `text` are dropped.
pub fn parse_ai_suggestions(raw: &str, text: &str, context: &SuggestionContext) -> AiSuggestions {
    let items: Vec<Value> = match serde_json::from_str(strip_json_fences(raw)) {
        Ok(items) => items,
        Err(e) => {
            warn!("Malformed AI suggestion response: {e}");
            return AiSuggestions::Unavailable(format!("malformed response: {e}"));
        }
    };

    let total = items.len();
    let suggestions: Vec<InlineSuggestion> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<RawAiSuggestion>(item) {
            Ok(raw) => locate_ai_suggestion(raw, text, context),
            Err(e) => {
                debug!("Dropping AI suggestion that does not fit the schema: {e}");
                None
            }
        })
        .collect();

    info!(
        "AI returned {total} suggestion(s), {} addressable",
        suggestions.len()
    );
    AiSuggestions::Suggestions(suggestions)
}

/// Keeps the model's offsets when they point at `original_text`; otherwise anchors
/// at the first occurrence. Unlocatable suggestions are dropped.
fn locate_ai_suggestion(
    raw: RawAiSuggestion,
    text: &str,
    context: &SuggestionContext,
) -> Option<InlineSuggestion> {
    if raw.original_text.is_empty() || raw.original_text == raw.suggested_text {
        return None;
    }

    let located = |start: usize, end: usize| NewSuggestion {
        suggestion_type: raw.suggestion_type,
        severity: raw.severity,
        context: context.clone(),
        original_text: raw.original_text.clone(),
        start_offset: start,
        end_offset: end,
        suggested_text: raw.suggested_text.clone(),
        reason: raw.reason.clone(),
        impact: raw.impact.clone(),
        source: SuggestionSource::Chat,
    };

    if let (Some(start), Some(end)) = (raw.start_offset, raw.end_offset) {
        let candidate = create_inline_suggestion(located(start, end));
        if is_suggestion_valid(text, &candidate) {
            return Some(candidate);
        }
    }

    let byte_start = text.find(&raw.original_text)?;
    let start = char_offset(text, byte_start);
    Some(create_inline_suggestion(located(
        start,
        start + char_len(&raw.original_text),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::suggestions::models::TargetSection;

    struct StubProvider(Result<String, ()>);

    #[async_trait]
    impl CompletionProvider for StubProvider {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.0.clone().map_err(|_| LlmError::EmptyContent)
        }
    }

    fn ctx() -> SuggestionContext {
        SuggestionContext::new(TargetSection::Experience, Some("e1"), Some("description"))
    }

    /// Every serialized field except id and created_at.
    fn fingerprint(list: &[InlineSuggestion]) -> Vec<Value> {
        list.iter()
            .map(|s| {
                let mut value = serde_json::to_value(s).unwrap();
                let fields = value.as_object_mut().unwrap();
                fields.remove("id");
                fields.remove("created_at");
                value
            })
            .collect()
    }

    #[test]
    fn test_scan_typo_scenario() {
        let out = scan("I am Responsable for sales.", &ctx());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].suggestion_type, SuggestionType::Typo);
        assert_eq!(out[0].original_text, "Responsable");
        assert_eq!(out[0].suggested_text, "Responsible");
        assert_eq!((out[0].start_offset, out[0].end_offset), (5, 16));
        assert_eq!(out[0].source, SuggestionSource::Scan);
    }

    #[test]
    fn test_scan_missing_metric_scenario() {
        let text = "Coordinated the quarterly planning process across several product teams";
        let out = scan(text, &ctx());
        let metrics: Vec<_> = out
            .iter()
            .filter(|s| s.suggestion_type == SuggestionType::Metric)
            .collect();
        assert_eq!(metrics.len(), 1);
        assert_eq!(
            metrics[0].suggested_text,
            format!("{}{}", metrics[0].original_text, rules::METRIC_PLACEHOLDER)
        );
    }

    #[test]
    fn test_scan_is_deterministic() {
        let text = "Responsible for managment of stuff in order to grow. Jan 2020 - june 2021";
        let a = scan(text, &ctx());
        let b = scan(text, &ctx());
        assert!(!a.is_empty());
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_scan_orders_by_rule_category() {
        let text = "Responsible for managment in order to grow";
        let types: Vec<_> = scan(text, &ctx())
            .into_iter()
            .map(|s| s.suggestion_type)
            .collect();
        assert_eq!(
            types,
            vec![
                SuggestionType::Typo,
                SuggestionType::Wording,
                SuggestionType::Wording
            ]
        );
    }

    #[test]
    fn test_scan_clean_text_yields_nothing() {
        assert!(scan("Cut p99 latency by 40%.", &ctx()).is_empty());
    }

    #[test]
    fn test_parse_ai_uses_valid_offsets_and_chat_source() {
        let raw = r#"[{"type":"wording","severity":"warning","original_text":"Responsible for",
            "suggested_text":"Led","reason":"weak","impact":"strong",
            "start_offset":0,"end_offset":15}]"#;
        let parsed = parse_ai_suggestions(raw, "Responsible for QA", &ctx());
        let AiSuggestions::Suggestions(out) = parsed else {
            panic!("expected suggestions");
        };
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, SuggestionSource::Chat);
        assert_eq!((out[0].start_offset, out[0].end_offset), (0, 15));
    }

    #[test]
    fn test_parse_ai_relocates_bad_offsets_and_drops_unlocatable() {
        let raw = r#"```json
[
  {"type":"typo","severity":"error","original_text":"managment",
 "suggested_text":"management","start_offset":40,"end_offset":49},
  {"type":"typo","severity":"error","original_text":"nowhere","suggested_text":"somewhere"},
  {"type":"bogus","severity":"error","original_text":"QA","suggested_text":"quality"}
]
```"#;
        let parsed = parse_ai_suggestions(raw, "Led managment of QA", &ctx());
        let AiSuggestions::Suggestions(out) = parsed else {
            panic!("expected suggestions");
        };
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].start_offset, out[0].end_offset), (4, 13));
    }

    #[test]
    fn test_parse_ai_malformed_is_unavailable() {
        assert!(matches!(
            parse_ai_suggestions("Sure! Here are some ideas.", "text", &ctx()),
            AiSuggestions::Unavailable(_)
        ));
        assert!(matches!(
            parse_ai_suggestions(r#"{"suggestions": []}"#, "text", &ctx()),
            AiSuggestions::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_ai_generator_falls_back_to_heuristic() {
        let generator = AiSuggestionGenerator::new(StubProvider(Err(())), true);
        let out = generator.generate("I am Responsable for sales.", &ctx()).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, SuggestionSource::Scan);
    }

    #[tokio::test]
    async fn test_ai_generator_without_fallback_returns_empty() {
        let stub = StubProvider(Ok("not json".to_string()));
        let generator = AiSuggestionGenerator::new(stub, false);
        assert!(generator
            .generate("I am Responsable for sales.", &ctx())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_ai_generator_returns_model_suggestions() {
        let raw = r#"[{"type":"tone","severity":"suggestion",
            "original_text":"sales","suggested_text":"revenue growth"}]"#;
        let generator = AiSuggestionGenerator::new(StubProvider(Ok(raw.to_string())), true);
        let out = generator.generate("I am Responsable for sales.", &ctx()).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].suggested_text, "revenue growth");
        assert_eq!((out[0].start_offset, out[0].end_offset), (21, 26));
        assert_eq!(generator.backend(), "ai");
    }
}
