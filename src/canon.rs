//! Canon value model and the apply pipeline.
//!
//! Canon is a nested JSON fact store: section name -> (entity id -> fact
//! object) for keyed sections such as `characters`, or an ordered array for
//! list sections. Every transform in this crate takes a canon value and
//! returns a new one; there is no in-place mutation entry point, so the
//! non-mutation invariant holds structurally.

use serde::Serialize;
use serde_json::Value;

use crate::diff::{apply_diff, validate_diff};
use crate::gate::check_hard_contradictions;

/// The authoritative narrative fact store for one project.
pub type Canon = serde_json::Map<String, Value>;

/// Character facts that are settable once and immutable thereafter.
pub const PROTECTED_FIELDS: [&str; 4] = ["name", "age", "alive", "location"];

/// Serialize a value to canonical JSON: sorted keys at every nesting level,
/// 2-space indent, trailing newline.
///
/// The value is routed through `serde_json::to_value` first so struct fields
/// are re-ordered by the sorted map representation. Identical values always
/// produce identical bytes, which downstream hashing and auditing rely on.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(value)?;
    let mut out = serde_json::to_string_pretty(&value)?;
    out.push('\n');
    Ok(out)
}

/// Apply `diff` to `canon` after validation.
///
/// Pipeline, strictly ordered and all-or-nothing:
/// 1. [`validate_diff`] — structural shape checks, canon-agnostic
/// 2. [`check_hard_contradictions`] — canon-aware gate over protected fields
/// 3. [`apply_diff`] — pure merge, only reached when both checks pass
///
/// Returns `(new_canon, [])` on acceptance, or `(canon, errors)` on
/// rejection with the original canon value unchanged. No partial application
/// is ever observable.
pub fn apply_canon_diff(canon: &Canon, diff: &Value) -> (Canon, Vec<String>) {
    let errors = validate_diff(diff);
    if !errors.is_empty() {
        return (canon.clone(), errors);
    }

    let errors = check_hard_contradictions(canon, diff);
    if !errors.is_empty() {
        return (canon.clone(), errors);
    }

    (apply_diff(canon, diff), Vec::new())
}
