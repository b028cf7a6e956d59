//! Story draft validation against canon.
//!
//! A character "appears" in a draft if it is listed in the top-level
//! `characters` list or speaks in any dialogue action. Appearance implies
//! the character is alive; explicit facts from the characters list overlay
//! that assumption. The extracted facts are packed into a synthetic diff and
//! run through the contradiction gate, so there is no duplicated rule logic
//! here.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::canon::{Canon, PROTECTED_FIELDS};
use crate::gate::check_hard_contradictions;

lazy_static! {
    static ref CONTRADICTION_RE: Regex = Regex::new(
        r"CONTRADICTION: (characters\.\S+)\s+[—-]+\s+canon='([^']*)'\s+vs\s+diff='([^']*)'"
    )
    .expect("static regex");
}

/// One draft/canon contradiction, parsed from a gate error string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonViolation {
    /// Dotted path of the contradicted fact, e.g.
    /// `characters.char_lena.alive`, or `unknown` for unparseable errors.
    pub field: String,
    pub canon_value: Option<String>,
    pub draft_value: Option<String>,
    /// The raw gate error string.
    pub message: String,
}

/// Validate a schema-valid `draft` against `canon`.
///
/// Returns an empty list when the draft is canon-consistent. Characters
/// absent from canon are never flagged; they are simply not yet defined.
pub fn validate_story_draft(draft: &Value, canon: &Canon) -> Vec<CanonViolation> {
    let appearing = extract_characters(draft);
    if appearing.is_empty() {
        return Vec::new();
    }

    let empty = Map::new();
    let canon_chars = canon
        .get("characters")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut modified_chars = Map::new();
    for (char_id, explicit_facts) in appearing {
        if !canon_chars.contains_key(&char_id) {
            continue;
        }

        let mut facts = Map::new();
        // Appearing in the draft implies the character is alive.
        facts.insert("alive".to_string(), Value::Bool(true));
        for fact_key in PROTECTED_FIELDS {
            if let Some(value) = explicit_facts.get(fact_key) {
                facts.insert(fact_key.to_string(), value.clone());
            }
        }
        modified_chars.insert(char_id, Value::Object(facts));
    }

    if modified_chars.is_empty() {
        return Vec::new();
    }

    let diff = json!({ "modified_facts": { "characters": modified_chars } });
    check_hard_contradictions(canon, &diff)
        .iter()
        .map(|error| parse_contradiction(error))
        .collect()
}

/// Extract char_id -> explicit facts from a draft.
///
/// Sources, in priority order: the top-level `characters` list (entries
/// with at least an `id`, optionally carrying protected facts), then the
/// `character`/`speaker` field of dialogue actions across all scenes
/// (presence only, no facts).
fn extract_characters(draft: &Value) -> BTreeMap<String, Map<String, Value>> {
    let mut chars = BTreeMap::new();

    if let Some(entries) = draft.get("characters").and_then(Value::as_array) {
        for entry in entries {
            let Some(entry) = entry.as_object() else {
                continue;
            };
            let Some(char_id) = entry.get("id").and_then(Value::as_str) else {
                continue;
            };
            if char_id.is_empty() {
                continue;
            }
            let mut facts = Map::new();
            for fact_key in PROTECTED_FIELDS {
                if let Some(value) = entry.get(fact_key) {
                    facts.insert(fact_key.to_string(), value.clone());
                }
            }
            chars.insert(char_id.to_string(), facts);
        }
    }

    if let Some(scenes) = draft.get("scenes").and_then(Value::as_array) {
        for scene in scenes {
            let Some(actions) = scene.get("actions").and_then(Value::as_array) else {
                continue;
            };
            for action in actions {
                if action.get("type").and_then(Value::as_str) != Some("dialogue") {
                    continue;
                }
                let speaker = action
                    .get("character")
                    .or_else(|| action.get("speaker"))
                    .and_then(Value::as_str);
                let Some(char_id) = speaker else {
                    continue;
                };
                if char_id.is_empty() {
                    continue;
                }
                chars.entry(char_id.to_string()).or_insert_with(Map::new);
            }
        }
    }

    chars
}

/// Parse a gate error string into a structured violation. Unexpected
/// formats degrade to a generic record rather than failing.
fn parse_contradiction(message: &str) -> CanonViolation {
    if let Some(captures) = CONTRADICTION_RE.captures(message) {
        return CanonViolation {
            field: captures[1].to_string(),
            canon_value: Some(captures[2].to_string()),
            draft_value: Some(captures[3].to_string()),
            message: message.to_string(),
        };
    }
    CanonViolation {
        field: "unknown".to_string(),
        canon_value: None,
        draft_value: None,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon_lena_alive_marco_dead() -> Canon {
        json!({
            "characters": {
                "char_lena": { "name": "Lena", "age": 30, "alive": true, "location": "Castle" },
                "char_marco": { "name": "Marco", "alive": false }
            }
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn draft_with_dialogue(char_id: &str) -> Value {
        json!({
            "script_id": "draft_001",
            "scenes": [
                {
                    "scene_id": "s001",
                    "actions": [
                        { "type": "dialogue", "character": char_id, "text": "..." },
                        { "type": "movement", "character": "char_ignored" }
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_consistent_draft_has_no_violations() {
        let violations =
            validate_story_draft(&draft_with_dialogue("char_lena"), &canon_lena_alive_marco_dead());
        assert!(violations.is_empty());
    }

    #[test]
    fn test_dead_character_dialogue_is_violation() {
        let violations = validate_story_draft(
            &draft_with_dialogue("char_marco"),
            &canon_lena_alive_marco_dead(),
        );
        assert_eq!(violations.len(), 1);
        let violation = &violations[0];
        assert_eq!(violation.field, "characters.char_marco.alive");
        assert_eq!(violation.canon_value.as_deref(), Some("false"));
        assert_eq!(violation.draft_value.as_deref(), Some("true"));
        assert!(violation.message.starts_with("CONTRADICTION"));
    }

    #[test]
    fn test_explicit_facts_checked_against_canon() {
        let draft = json!({
            "characters": [
                { "id": "char_lena", "name": "Elena", "age": 30 }
            ]
        });
        let violations = validate_story_draft(&draft, &canon_lena_alive_marco_dead());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "characters.char_lena.name");
        assert_eq!(violations[0].canon_value.as_deref(), Some("Lena"));
        assert_eq!(violations[0].draft_value.as_deref(), Some("Elena"));
    }

    #[test]
    fn test_explicit_dead_marking_of_living_character() {
        let draft = json!({
            "characters": [ { "id": "char_lena", "alive": false } ]
        });
        let violations = validate_story_draft(&draft, &canon_lena_alive_marco_dead());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "characters.char_lena.alive");
    }

    #[test]
    fn test_unknown_character_never_flagged() {
        let violations = validate_story_draft(
            &draft_with_dialogue("char_unwritten"),
            &canon_lena_alive_marco_dead(),
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_dead_and_alive_in_same_draft() {
        let draft = json!({
            "scenes": [
                {
                    "scene_id": "s001",
                    "actions": [
                        { "type": "dialogue", "character": "char_lena" },
                        { "type": "dialogue", "speaker": "char_marco" }
                    ]
                }
            ]
        });
        let violations = validate_story_draft(&draft, &canon_lena_alive_marco_dead());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "characters.char_marco.alive");
    }

    #[test]
    fn test_characters_list_takes_precedence_over_dialogue() {
        // Explicit entry carries facts even when the same character speaks.
        let draft = json!({
            "characters": [ { "id": "char_lena", "location": "Harbor" } ],
            "scenes": [
                {
                    "scene_id": "s001",
                    "actions": [ { "type": "dialogue", "character": "char_lena" } ]
                }
            ]
        });
        let violations = validate_story_draft(&draft, &canon_lena_alive_marco_dead());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "characters.char_lena.location");
    }

    #[test]
    fn test_empty_draft_is_consistent() {
        let violations = validate_story_draft(&json!({}), &canon_lena_alive_marco_dead());
        assert!(violations.is_empty());
    }

    #[test]
    fn test_unparseable_error_degrades_to_generic_record() {
        let violation = parse_contradiction("INVALID_DIFF: something unexpected");
        assert_eq!(violation.field, "unknown");
        assert!(violation.canon_value.is_none());
        assert!(violation.draft_value.is_none());
        assert_eq!(violation.message, "INVALID_DIFF: something unexpected");
    }
}
