//! CanonDiff structural validation and pure application.
//!
//! [`validate_diff`] checks shape and types only; it never inspects canon.
//! [`apply_diff`] merges a validated diff into a canon value and returns a
//! new canon; neither input is mutated.

use serde_json::{Map, Value};

use crate::canon::Canon;

const ALLOWED_TOP_KEYS: [&str; 5] = [
    "added_facts",
    "justification",
    "modified_facts",
    "provenance",
    "removed_facts",
];

/// Structural validation of a CanonDiff.
///
/// Returns a list of error strings; an empty list means the diff is
/// structurally valid. Never panics and never looks at canon state.
pub fn validate_diff(diff: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(obj) = diff.as_object() else {
        return vec!["INVALID_DIFF: diff must be an object".to_string()];
    };

    // Map keys iterate sorted, so the report is deterministic.
    let unknown: Vec<&str> = obj
        .keys()
        .map(String::as_str)
        .filter(|k| !ALLOWED_TOP_KEYS.contains(k))
        .collect();
    if !unknown.is_empty() {
        errors.push(format!(
            "INVALID_DIFF: unknown top-level keys: {unknown:?}"
        ));
    }

    for key in ["modified_facts", "added_facts"] {
        if let Some(section) = obj.get(key) {
            if !section.is_object() {
                errors.push(format!("INVALID_DIFF: '{key}' must be an object"));
            }
        }
    }

    if let Some(removed) = obj.get("removed_facts") {
        match removed.as_object() {
            None => errors.push("INVALID_DIFF: 'removed_facts' must be an object".to_string()),
            Some(sections) => {
                for (section, keys) in sections {
                    match keys.as_array() {
                        None => errors.push(format!(
                            "INVALID_DIFF: removed_facts.{section} must be a list of string keys"
                        )),
                        Some(list) if !list.iter().all(Value::is_string) => {
                            errors.push(format!(
                                "INVALID_DIFF: removed_facts.{section} must contain only string keys"
                            ));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    errors
}

/// Apply a CanonDiff to a canon value and return the updated canon.
///
/// Pure function: the inputs are cloned, never mutated. Assumes the diff
/// already passed [`validate_diff`] and the contradiction gate.
///
/// Merge order is fixed and significant:
/// 1. `added_facts` — insert new entries; existing keys are never overwritten
/// 2. `modified_facts` — shallow key-wise merge into existing entries; an
///    entity absent at this point is silently skipped (the gate rejects that
///    case for characters before application)
/// 3. `removed_facts` — delete listed keys from object sections, drop equal
///    elements from array sections
pub fn apply_diff(canon: &Canon, diff: &Value) -> Canon {
    let mut new_canon = canon.clone();
    let empty = Map::new();
    let diff = diff.as_object().unwrap_or(&empty);

    // 1. added_facts
    if let Some(added) = diff.get("added_facts").and_then(Value::as_object) {
        for (section, entries) in added {
            match entries {
                Value::Object(entries) => {
                    let slot = new_canon
                        .entry(section.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                    if let Value::Object(target) = slot {
                        for (entry_id, data) in entries {
                            if !target.contains_key(entry_id) {
                                target.insert(entry_id.clone(), data.clone());
                            }
                        }
                    }
                }
                Value::Array(items) => {
                    let slot = new_canon
                        .entry(section.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if !slot.is_array() {
                        *slot = Value::Array(Vec::new());
                    }
                    if let Value::Array(target) = slot {
                        target.extend(items.iter().cloned());
                    }
                }
                _ => {}
            }
        }
    }

    // 2. modified_facts
    if let Some(modified) = diff.get("modified_facts").and_then(Value::as_object) {
        for (section, entries) in modified {
            let Some(entries) = entries.as_object() else {
                continue;
            };
            let Some(target) = new_canon.get_mut(section).and_then(Value::as_object_mut) else {
                continue;
            };
            for (entry_id, data) in entries {
                let Some(data) = data.as_object() else {
                    continue;
                };
                let Some(entry) = target.get_mut(entry_id).and_then(Value::as_object_mut) else {
                    continue;
                };
                for (key, value) in data {
                    entry.insert(key.clone(), value.clone());
                }
            }
        }
    }

    // 3. removed_facts
    if let Some(removed) = diff.get("removed_facts").and_then(Value::as_object) {
        for (section, keys) in removed {
            let Some(keys) = keys.as_array() else {
                continue;
            };
            match new_canon.get_mut(section) {
                Some(Value::Object(target)) => {
                    for key in keys {
                        if let Some(key) = key.as_str() {
                            target.remove(key);
                        }
                    }
                }
                Some(Value::Array(items)) => {
                    items.retain(|element| !keys.contains(element));
                }
                _ => {}
            }
        }
    }

    new_canon
}
