//! Shot-list decision engine: policy tokens, dead-character checks, and the
//! CanonDecision artifact.
//!
//! The engine scans every human-readable text field of every shot against
//! three independent signals and emits an allow/deny verdict. Precedence,
//! highest wins and fully determines `reasons` (never mixed):
//! canon-contradiction > policy-token > verbose forbidden reasons.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::canon::canonical_json;
use crate::shotlist::{ShotListSource, ShotSource};

lazy_static! {
    // '_' is a word character, so the double-underscore wrapped form is not
    // matched here; that form belongs to the policy-token set.
    static ref FORBIDDEN_RE: Regex = Regex::new(r"\bFORBIDDEN\b").expect("static regex");
}

/// Reason snippets are truncated to keep the artifact size bounded.
const REASON_TEXT_MAX: usize = 200;

/// Errors from loading the policy-token file. A failure here is fatal at
/// startup; the engine never runs with a partial policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy file missing: {}", .0.display())]
    Missing(PathBuf),

    #[error("IO error reading policy file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid policy format: {}", .0.display())]
    InvalidFormat(PathBuf),
}

/// Immutable, externally configured set of forbidden policy tokens.
///
/// Loaded once at startup and passed by reference into the engine. Tokens
/// are matched as exact substrings, case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct PolicyTokens {
    tokens: BTreeSet<String>,
}

impl PolicyTokens {
    /// Load tokens from a JSON file: either a bare array of strings or an
    /// object with a `forbidden_tokens` array. Non-string entries are
    /// dropped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PolicyError::Missing(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        let data: Value = serde_json::from_str(&content)
            .map_err(|_| PolicyError::InvalidFormat(path.to_path_buf()))?;

        let entries = match &data {
            Value::Array(entries) => entries.as_slice(),
            Value::Object(obj) => obj
                .get("forbidden_tokens")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => return Err(PolicyError::InvalidFormat(path.to_path_buf())),
        };

        Ok(Self::from_tokens(
            entries.iter().filter_map(Value::as_str).map(str::to_string),
        ))
    }

    /// Build a token set directly; used by tests and embedded callers.
    pub fn from_tokens(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// True if any token occurs in `text` as an exact substring.
    pub fn matches(&self, text: &str) -> bool {
        self.tokens.iter().any(|token| text.contains(token.as_str()))
    }
}

/// Errors from the decision engine's input-contract checks. These are
/// raised, not returned as a deny, because they signal malformed business
/// data from the caller.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("ShotList missing timing_lock_hash")]
    MissingTimingLockHash,

    #[error("ShotList missing schema metadata")]
    MissingSchemaMetadata,

    #[error("invalid CanonSnapshot input")]
    InvalidSnapshot,
}

/// Producer metadata stamped into every decision artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub repo: String,
    pub component: String,
}

impl Default for Producer {
    fn default() -> Self {
        Self {
            repo: "world-canon".to_string(),
            component: "CanonGate".to_string(),
        }
    }
}

/// The allow/deny verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

/// Decision artifact emitted per evaluated shot-list.
///
/// Carries no timestamps or generated ids, so equal inputs always serialize
/// to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonDecision {
    pub schema_id: String,
    pub schema_version: String,
    pub producer: Producer,
    pub timing_lock_hash: String,
    pub decision: Decision,
    pub reasons: Vec<String>,
}

impl CanonDecision {
    fn new(timing_lock_hash: &str, reasons: Vec<String>) -> Self {
        Self {
            schema_id: "CanonDecision".to_string(),
            schema_version: "0.0.1".to_string(),
            producer: Producer::default(),
            timing_lock_hash: timing_lock_hash.to_string(),
            decision: if reasons.is_empty() {
                Decision::Allow
            } else {
                Decision::Deny
            },
            reasons,
        }
    }
}

/// Serialize a decision to canonical JSON (sorted keys, 2-space indent,
/// trailing newline).
pub fn dump_decision(decision: &CanonDecision) -> serde_json::Result<String> {
    canonical_json(decision)
}

/// Evaluate `content` against the frozen `policy` tokens and an optional
/// canon `snapshot`, returning a [`CanonDecision`].
///
/// Preconditions, checked before any scan: a missing or empty
/// `timing_lock_hash`, or missing schema metadata, is a [`DecisionError`];
/// so is a snapshot value that is not an object containing `entities`.
///
/// Signals per text field:
/// - `APPEARS:<char_id>` where the id is dead in the snapshot
/// - any policy token as an exact substring
/// - the standalone word `FORBIDDEN` (word-boundary, case-sensitive), which
///   yields one bounded human-readable reason per offending shot
pub fn evaluate_shotlist<S: ShotListSource>(
    content: &S,
    snapshot: Option<&Value>,
    policy: &PolicyTokens,
) -> Result<CanonDecision, DecisionError> {
    let timing_lock_hash = content
        .timing_lock_hash()
        .filter(|hash| !hash.is_empty())
        .ok_or(DecisionError::MissingTimingLockHash)?;
    let schema_ok = content.schema_id().is_some_and(|id| !id.is_empty())
        && content.schema_version().is_some_and(|ver| !ver.is_empty());
    if !schema_ok {
        return Err(DecisionError::MissingSchemaMetadata);
    }

    let dead_characters = match snapshot {
        Some(snapshot) => dead_character_ids(snapshot)?,
        None => BTreeSet::new(),
    };

    let mut contradiction_found = false;
    let mut policy_token_found = false;
    let mut verbose_reasons: Vec<String> = Vec::new();

    for shot in content.shots() {
        let mut shot_flagged = false;
        for text in shot_texts(shot) {
            if dead_characters
                .iter()
                .any(|id| text.contains(&format!("APPEARS:{id}")))
            {
                contradiction_found = true;
            }
            if policy.matches(text) {
                policy_token_found = true;
            } else if !shot_flagged && FORBIDDEN_RE.is_match(text) {
                let snippet: String = text.chars().take(REASON_TEXT_MAX).collect();
                verbose_reasons.push(format!(
                    "shot '{}' contains FORBIDDEN token: '{snippet}'",
                    shot.shot_id()
                ));
                shot_flagged = true;
            }
        }
    }

    let reasons = if contradiction_found {
        vec!["CANON_CONTRADICTION".to_string()]
    } else if policy_token_found {
        vec!["FORBIDDEN_TOKEN".to_string()]
    } else {
        verbose_reasons
    };

    Ok(CanonDecision::new(timing_lock_hash, reasons))
}

/// Character ids whose snapshot `alive` fact equals the string `"false"`.
///
/// The snapshot must be an object containing an `entities` array; anything
/// else breaches the input contract.
fn dead_character_ids(snapshot: &Value) -> Result<BTreeSet<String>, DecisionError> {
    let entities = snapshot
        .as_object()
        .and_then(|obj| obj.get("entities"))
        .and_then(Value::as_array)
        .ok_or(DecisionError::InvalidSnapshot)?;

    let mut dead = BTreeSet::new();
    for entity in entities {
        let Some(entity) = entity.as_object() else {
            continue;
        };
        if entity.get("type").and_then(Value::as_str) != Some("character") {
            continue;
        }
        let Some(id) = entity.get("id").and_then(Value::as_str) else {
            continue;
        };
        let facts = entity.get("facts").and_then(Value::as_array);
        let is_dead = facts.is_some_and(|facts| {
            facts.iter().any(|fact| {
                fact.get("k").and_then(Value::as_str) == Some("alive")
                    && fact.get("v").and_then(Value::as_str) == Some("false")
            })
        });
        if is_dead {
            dead.insert(id.to_string());
        }
    }
    Ok(dead)
}

/// Collect all human-readable string fields from a shot, defensively:
/// absence of any field or sub-object never fails the scan.
fn shot_texts<S: ShotSource>(shot: &S) -> Vec<&str> {
    let mut texts = Vec::new();
    for text in [
        shot.action_beat(),
        shot.environment_notes(),
        shot.camera_framing(),
        shot.camera_movement(),
        shot.action_summary(),
    ]
    .into_iter()
    .flatten()
    {
        texts.push(text);
    }
    if let Some(camera) = shot.camera() {
        texts.extend(camera.framing_hint());
        texts.extend(camera.movement());
    }
    if let Some(audio) = shot.audio_intent() {
        texts.extend(audio.vo_text());
        texts.extend(audio.vo_speaker_id());
    }
    texts
}
