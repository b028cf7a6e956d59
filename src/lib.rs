//! Canon store and contradiction gate for multi-episode generated content.
//!
//! This crate provides:
//! - A diff validate/gate/apply pipeline that is the only writer of canon
//! - Contradiction detection over protected character facts
//! - Durable per-project persistence (snapshot + append-only diff history)
//! - A shot-list decision engine and a story draft validator that consume
//!   the same gate logic
//!
//! # Quick Start
//!
//! ```
//! use world_canon::{apply_canon_diff, Canon};
//! use serde_json::json;
//!
//! let canon = Canon::new();
//! let diff = json!({
//!     "added_facts": {
//!         "characters": {
//!             "char_marco": { "name": "Marco", "age": 25, "alive": true }
//!         }
//!     },
//!     "justification": "Marco introduced in episode 1"
//! });
//!
//! let (canon, errors) = apply_canon_diff(&canon, &diff);
//! assert!(errors.is_empty());
//! assert_eq!(canon["characters"]["char_marco"]["name"].as_str(), Some("Marco"));
//! ```

pub mod canon;
pub mod decision;
pub mod diff;
pub mod draft;
pub mod gate;
pub mod shotlist;
pub mod snapshot;
pub mod store;

// Primary public API
pub use canon::{apply_canon_diff, canonical_json, Canon, PROTECTED_FIELDS};
pub use decision::{
    dump_decision, evaluate_shotlist, CanonDecision, Decision, DecisionError, PolicyError,
    PolicyTokens, Producer,
};
pub use diff::{apply_diff, validate_diff};
pub use draft::{validate_story_draft, CanonViolation};
pub use gate::check_hard_contradictions;
pub use shotlist::{
    AudioIntent, AudioSource, CameraSource, CharacterInShot, Shot, ShotList, ShotListSource,
    ShotSource,
};
pub use snapshot::{CanonEntity, CanonFact, CanonSnapshot, SnapshotError};
pub use store::{ProjectStore, StoreError};
