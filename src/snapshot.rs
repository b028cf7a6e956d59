//! CanonSnapshot: a read-only entity/fact projection of canon.
//!
//! The decision engine consumes snapshots to derive the dead-character set;
//! it never reads canon directly. Fact values are stringified on projection
//! (`true` becomes `"true"`), which is why downstream checks compare against
//! the string forms.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::canon::{canonical_json, Canon};

/// Error from the strict snapshot loader.
///
/// Every shape problem collapses to this single variant; callers treat a
/// malformed snapshot as an upstream contract breach, not as data.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid CanonSnapshot input")]
    Invalid,
}

/// One `{k, v}` fact inside a snapshot entity. Values are always strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonFact {
    pub k: String,
    pub v: String,
}

/// One entity in a snapshot, typically a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub facts: Vec<CanonFact>,
}

/// Read-only export of a project's canon at one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonSnapshot {
    #[serde(default = "default_schema_id")]
    pub schema_id: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub episode_id: String,
    pub canon_hash: String,
    #[serde(default)]
    pub entities: Vec<CanonEntity>,
}

fn default_schema_id() -> String {
    "CanonSnapshot".to_string()
}

fn default_schema_version() -> String {
    "0.0.1".to_string()
}

impl CanonSnapshot {
    /// Strictly load a snapshot from an arbitrary JSON value.
    ///
    /// Unknown fields are ignored for forward compatibility; a missing
    /// required field or a wrong `schema_id` is [`SnapshotError::Invalid`].
    pub fn from_value(value: &Value) -> Result<Self, SnapshotError> {
        let snapshot: CanonSnapshot =
            serde_json::from_value(value.clone()).map_err(|_| SnapshotError::Invalid)?;
        if snapshot.schema_id != "CanonSnapshot" {
            return Err(SnapshotError::Invalid);
        }
        Ok(snapshot)
    }

    /// Strictly load a snapshot from JSON text.
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(text).map_err(|_| SnapshotError::Invalid)?;
        Self::from_value(&value)
    }

    /// Project the `characters` section of `canon` into a snapshot.
    ///
    /// Entities and facts come out in sorted order; null facts are dropped.
    /// `canon_hash` is the SHA-256 hex digest of the canonical canon bytes,
    /// so equal canon values always produce the same hash.
    pub fn project(canon: &Canon, episode_id: impl Into<String>) -> Self {
        let mut entities = Vec::new();
        if let Some(characters) = canon.get("characters").and_then(Value::as_object) {
            for (char_id, facts) in characters {
                let mut entity_facts = Vec::new();
                if let Some(facts) = facts.as_object() {
                    for (key, value) in facts {
                        if value.is_null() {
                            continue;
                        }
                        entity_facts.push(CanonFact {
                            k: key.clone(),
                            v: fact_string(value),
                        });
                    }
                }
                entities.push(CanonEntity {
                    id: char_id.clone(),
                    entity_type: "character".to_string(),
                    facts: entity_facts,
                });
            }
        }

        let canon_bytes = canonical_json(canon).unwrap_or_default();
        Self {
            schema_id: default_schema_id(),
            schema_version: default_schema_version(),
            episode_id: episode_id.into(),
            canon_hash: format!("{:x}", Sha256::digest(canon_bytes.as_bytes())),
            entities,
        }
    }

    /// The snapshot as a plain JSON value, as consumed by the decision
    /// engine.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Stringify a fact value for snapshot export: strings verbatim, everything
/// else as compact JSON (`true` -> `"true"`, `30` -> `"30"`).
fn fact_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
