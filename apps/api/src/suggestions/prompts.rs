// Suggestion engine LLM prompt templates.

pub const AI_SUGGESTION_SYSTEM: &str = "\
You are an exacting resume editor. You propose small, surgical edits to one field of a resume. \
Prefer strong action verbs, quantified outcomes, concise phrasing, active voice \
and a professional tone. \
Never invent facts, employers, numbers or technologies that are not in the text; \
use a placeholder such as [X]% when a metric is missing.";

pub const AI_SUGGESTION_PROMPT_TEMPLATE: &str = r#"Review the following resume text and propose inline edits.

SECTION: {section}
FIELD: {field}

TEXT:
{text}

{verbatim_instruction}

OUTPUT SCHEMA (return a JSON array, possibly empty, of objects with exactly these keys):
[
  {
    "type": "typo" | "grammar" | "wording" | "tone" | "formatting" | "metric",
    "severity": "error" | "warning" | "suggestion",
    "original_text": "exact substring of TEXT",
    "suggested_text": "replacement for original_text",
    "start_offset": number,  // char index of original_text in TEXT
    "end_offset": number,    // start_offset + length of original_text
    "reason": "one sentence on what is wrong",
    "impact": "one sentence on why the edit helps"
  }
]

Use severity "error" only for spelling and grammar mistakes. Return at most 8 suggestions."#;
