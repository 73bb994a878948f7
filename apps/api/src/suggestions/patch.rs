//! Offset-patch engine: splices a suggestion's replacement into a text blob.
//!
//! Offsets are char (Unicode scalar) indices. `apply_suggestion` is pure and does
//! no validity check; `apply_batch` is the safe way to apply several suggestions
//! to one field because it rebases and revalidates before every edit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::suggestions::models::{is_suggestion_valid, InlineSuggestion};

// ────────────────────────────────────────────────────────────────────────────
// Char offset helpers
// ────────────────────────────────────────────────────────────────────────────

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the `char_idx`-th char, clamped to the end of the text.
fn byte_index(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(b, _)| b)
        .unwrap_or(text.len())
}

/// Char offset of a byte position (as returned by `str::find` or a regex match).
pub fn char_offset(text: &str, byte_idx: usize) -> usize {
    text[..byte_idx].chars().count()
}

/// `text[start..end]` in chars, or `None` when the range is inverted or out of bounds.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end || end > char_len(text) {
        return None;
    }
    Some(&text[byte_index(text, start)..byte_index(text, end)])
}

// ────────────────────────────────────────────────────────────────────────────
// Single application
// ────────────────────────────────────────────────────────────────────────────

/// Returns `text[..start] + suggested_text + text[end..]`.
///
/// Out-of-range offsets are clamped so this never panics, but a stale suggestion
/// still lands in the wrong place. Call `is_suggestion_valid` first.
pub fn apply_suggestion(text: &str, suggestion: &InlineSuggestion) -> String {
    splice(
        text,
        suggestion.start_offset,
        suggestion.end_offset,
        &suggestion.suggested_text,
    )
}

pub(crate) fn splice(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let len = char_len(text);
    let start = start.min(len);
    let end = end.clamp(start, len);
    let (start_b, end_b) = (byte_index(text, start), byte_index(text, end));

    let mut out = String::with_capacity(text.len() - (end_b - start_b) + replacement.len());
    out.push_str(&text[..start_b]);
    out.push_str(replacement);
    out.push_str(&text[end_b..]);
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Batch application for one field
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Offsets no longer match `original_text` in the current text.
    Stale,
    /// Range collides with an edit already applied in this batch.
    Overlap,
    /// Status is no longer pending.
    AlreadyResolved,
    /// Target does not exist in the profile.
    Unresolvable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedSuggestion {
    pub id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub text: String,
    /// Ids in the order they were applied.
    pub applied: Vec<String>,
    pub skipped: Vec<SkippedSuggestion>,
}

/// Applies suggestions targeting one field, one at a time in ascending
/// `start_offset` order.
///
/// Each suggestion's offsets are rebased by the length delta of the edits applied
/// before it and revalidated against the text as it stands at that moment. A
/// suggestion that starts inside an already-applied edit, or at the same point as
/// one, is skipped as an overlap; one that fails revalidation is skipped as stale.
/// The batch never aborts.
pub fn apply_batch(text: &str, suggestions: &[InlineSuggestion]) -> BatchResult {
    let mut skipped = Vec::new();
    let mut ordered: Vec<&InlineSuggestion> = Vec::with_capacity(suggestions.len());

    for s in suggestions {
        if s.is_pending() {
            ordered.push(s);
        } else {
            skipped.push(SkippedSuggestion {
                id: s.id.clone(),
                reason: SkipReason::AlreadyResolved,
            });
        }
    }
    ordered.sort_by_key(|s| (s.start_offset, s.end_offset));

    let mut current = text.to_string();
    let mut applied = Vec::new();
    let mut delta: isize = 0;
    // Range of the last applied edit, in original-text coordinates. Applied edits
    // never overlap, so its end is also the furthest end applied so far.
    let mut last_applied: Option<(usize, usize)> = None;

    for s in ordered {
        let collides = last_applied.is_some_and(|(start, end)| {
            s.start_offset == start || s.start_offset < end
        });
        if collides {
            debug!("Skipping suggestion {}: overlaps an applied edit", s.id);
            skipped.push(SkippedSuggestion {
                id: s.id.clone(),
                reason: SkipReason::Overlap,
            });
            continue;
        }

        let rebased = match rebase(s, delta) {
            Some(r) if is_suggestion_valid(&current, &r) => r,
            _ => {
                debug!("Skipping suggestion {}: text has changed", s.id);
                skipped.push(SkippedSuggestion {
                    id: s.id.clone(),
                    reason: SkipReason::Stale,
                });
                continue;
            }
        };

        current = apply_suggestion(&current, &rebased);
        delta += char_len(&s.suggested_text) as isize - (s.end_offset - s.start_offset) as isize;
        last_applied = Some((s.start_offset, s.end_offset.max(s.start_offset)));
        applied.push(s.id.clone());
    }

    BatchResult {
        text: current,
        applied,
        skipped,
    }
}

fn rebase(s: &InlineSuggestion, delta: isize) -> Option<InlineSuggestion> {
    let start = s.start_offset.checked_add_signed(delta)?;
    let end = s.end_offset.checked_add_signed(delta)?;
    Some(InlineSuggestion {
        start_offset: start,
        end_offset: end,
        ..s.clone()
    })
}
