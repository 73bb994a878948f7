// Shared prompt fragments. Each module that calls the LLM keeps its own
// prompts.rs alongside it and builds on these.

/// System prompt fragment that enforces a bare JSON array as output.
pub const JSON_ARRAY_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with a valid JSON array only. \
    Do NOT include any text outside the JSON array. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction that keeps edits addressable by exact substring.
pub const VERBATIM_INSTRUCTION: &str = "\
    CRITICAL: `original_text` must be copied character-for-character from the input, \
    including case and punctuation. Never paraphrase it. \
    Edits that cannot be expressed as a replacement of an exact substring must be omitted.";
