//! Contradiction gate: canon-aware checks over protected character facts.
//!
//! Character entries are keyed by a stable character id (e.g. `char_lena`),
//! distinct from the human-readable `name` fact inside the entry. There is
//! no auto-repair: contradictions are returned as structured error strings
//! and the canon value is untouched.

use serde_json::{Map, Value};

use crate::canon::{Canon, PROTECTED_FIELDS};

/// Detect hard contradictions between `diff` and the current `canon`.
///
/// For every character id in `modified_facts.characters`:
/// 1. Existence — the id must already exist in canon or be introduced by
///    `added_facts.characters` in the same diff; otherwise an existence
///    error is emitted and field checks are skipped for that id.
/// 2. Protected fields — for each of `name`, `age`, `alive`, `location`
///    present in the change: a non-null canon value that differs from the
///    proposed value is a contradiction. Re-asserting the same value is a
///    no-op. A `name` change only counts when the incoming value is a
///    non-empty string.
///
/// All findings across all characters and fields are collected; there is no
/// short-circuit on the first hit. An empty list means no hard
/// contradictions.
pub fn check_hard_contradictions(canon: &Canon, diff: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let empty = Map::new();

    let canon_chars = canon
        .get("characters")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let added_chars = diff
        .pointer("/added_facts/characters")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let modified_chars = diff
        .pointer("/modified_facts/characters")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    for (char_id, changes) in modified_chars {
        if !canon_chars.contains_key(char_id) && !added_chars.contains_key(char_id) {
            errors.push(format!(
                "INVALID_DIFF: characters.{char_id} modified but does not exist (use added_facts)"
            ));
            continue; // field checks are meaningless for a non-existent character
        }

        // A character being added in this same diff has no prior state, so
        // no field-level contradiction is possible against it.
        let canon_char = canon_chars
            .get(char_id)
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let Some(changes) = changes.as_object() else {
            continue; // structural issues are caught by validate_diff
        };

        for field in PROTECTED_FIELDS {
            let Some(new_value) = changes.get(field) else {
                continue;
            };
            if field == "name" && !matches!(new_value.as_str(), Some(s) if !s.is_empty()) {
                continue;
            }
            if let Some(old_value) = canon_char.get(field) {
                if !old_value.is_null() && old_value != new_value {
                    errors.push(format!(
                        "CONTRADICTION: characters.{char_id}.{field} — canon='{}' vs diff='{}'",
                        fact_repr(old_value),
                        fact_repr(new_value)
                    ));
                }
            }
        }
    }

    errors
}

/// Render a fact value for an error message: strings without quotes,
/// everything else as compact JSON.
fn fact_repr(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
