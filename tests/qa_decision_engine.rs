//! QA tests for the shot-list decision engine.
//!
//! These tests drive `evaluate_shotlist` through the full artifact flow:
//! canon -> snapshot projection -> scan -> serialized decision.

use std::fs;

use serde_json::json;
use tempfile::TempDir;
use world_canon::{
    apply_canon_diff, dump_decision, evaluate_shotlist, AudioIntent, Canon, CanonSnapshot,
    Decision, PolicyTokens, Shot, ShotList,
};

fn shot(shot_id: &str, action_beat: &str) -> Shot {
    Shot {
        shot_id: shot_id.to_string(),
        scene_id: "s001".to_string(),
        duration_sec: 2.0,
        camera_framing: "WIDE".to_string(),
        camera_movement: "STATIC".to_string(),
        characters: Vec::new(),
        environment_notes: String::new(),
        action_beat: action_beat.to_string(),
        audio_intent: AudioIntent::default(),
        emotional_tag: None,
        shot_template_id: None,
    }
}

fn shotlist(shots: Vec<Shot>) -> ShotList {
    let total = shots.iter().map(|s| s.duration_sec).sum();
    ShotList {
        schema_id: "ShotList".to_string(),
        schema_version: "1.0.0".to_string(),
        shotlist_id: "sl_qa".to_string(),
        script_id: "script_qa".to_string(),
        episode_id: Some("ep002".to_string()),
        shots,
        total_duration_sec: total,
        timing_lock_hash: "e".repeat(64),
        created_at: "1970-01-01T00:00:00Z".to_string(),
    }
}

/// Build canon where Lena died on screen, then project a snapshot from it.
fn snapshot_with_dead_lena() -> CanonSnapshot {
    let diff = json!({
        "added_facts": {
            "characters": { "char_lena": { "name": "Lena", "alive": false } }
        }
    });
    let (canon, errors) = apply_canon_diff(&Canon::new(), &diff);
    assert!(errors.is_empty());
    CanonSnapshot::project(&canon, "ep002")
}

// =============================================================================
// TEST 1: Dead character appearing on screen
// =============================================================================

#[test]
fn test_dead_character_appearance_is_contradiction() {
    let content = shotlist(vec![shot("s001_shot_001", "APPEARS:char_lena")]);

    // Round the snapshot through a file, as an orchestrator hands it over.
    let tmp = TempDir::new().expect("Failed to create temp directory");
    let snapshot_path = tmp.path().join("CanonSnapshot.ep002.json");
    fs::write(
        &snapshot_path,
        serde_json::to_string(&snapshot_with_dead_lena()).expect("serialize snapshot"),
    )
    .expect("write snapshot artifact");

    let snapshot =
        CanonSnapshot::from_json(&fs::read_to_string(&snapshot_path).expect("read snapshot"))
            .expect("snapshot artifact must load strictly")
            .to_value();

    let decision = evaluate_shotlist(&content, Some(&snapshot), &PolicyTokens::default())
        .expect("evaluate should succeed");

    assert_eq!(decision.decision, Decision::Deny);
    assert_eq!(decision.reasons, vec!["CANON_CONTRADICTION"]);
}

// =============================================================================
// TEST 2: Precedence is exclusive, never mixed
// =============================================================================

#[test]
fn test_contradiction_reason_is_exclusive() {
    let content = shotlist(vec![
        shot("s001_shot_001", "APPEARS:char_lena in the hall"),
        shot("s001_shot_002", "a FORBIDDEN ritual"),
        shot("s001_shot_003", "marked __FORBIDDEN__ by policy"),
    ]);
    let snapshot = snapshot_with_dead_lena().to_value();
    let policy = PolicyTokens::from_tokens(["__FORBIDDEN__".to_string()]);

    let decision = evaluate_shotlist(&content, Some(&snapshot), &policy)
        .expect("evaluate should succeed");

    assert_eq!(decision.decision, Decision::Deny);
    assert_eq!(decision.reasons, vec!["CANON_CONTRADICTION"]);
}

// =============================================================================
// TEST 3: Policy tokens loaded from an external file
// =============================================================================

#[test]
fn test_policy_file_drives_token_denial() {
    let tmp = TempDir::new().expect("Failed to create temp directory");
    let policy_path = tmp.path().join("forbidden_tokens.json");
    fs::write(
        &policy_path,
        r#"{ "forbidden_tokens": ["__FORBIDDEN__", "__REDACTED__"] }"#,
    )
    .expect("write policy file");

    let policy = PolicyTokens::load(&policy_path).expect("policy load is a startup requirement");
    let content = shotlist(vec![shot("s001_shot_001", "scene marked __REDACTED__")]);

    let decision =
        evaluate_shotlist(&content, None, &policy).expect("evaluate should succeed");

    assert_eq!(decision.decision, Decision::Deny);
    assert_eq!(decision.reasons, vec!["FORBIDDEN_TOKEN"]);
}

// =============================================================================
// TEST 4: Serialized decisions are byte-identical for equal inputs
// =============================================================================

#[test]
fn test_decision_bytes_deterministic() {
    let content = shotlist(vec![shot("s001_shot_001", "APPEARS:char_lena returns")]);
    let snapshot = snapshot_with_dead_lena().to_value();
    let policy = PolicyTokens::default();

    let run1 = dump_decision(
        &evaluate_shotlist(&content, Some(&snapshot), &policy).expect("evaluate"),
    )
    .expect("dump");
    let run2 = dump_decision(
        &evaluate_shotlist(&content, Some(&snapshot), &policy).expect("evaluate"),
    )
    .expect("dump");

    assert_eq!(run1, run2);

    // Canonical form: sorted keys, deny verdict, single reason.
    assert!(run1.contains("\"decision\": \"deny\""));
    assert!(run1.contains("\"CANON_CONTRADICTION\""));
    let decision_pos = run1.find("\"decision\"").unwrap();
    let producer_pos = run1.find("\"producer\"").unwrap();
    let timing_pos = run1.find("\"timing_lock_hash\"").unwrap();
    assert!(decision_pos < producer_pos && producer_pos < timing_pos);
}

// =============================================================================
// TEST 5: Clean content allows with empty reasons
// =============================================================================

#[test]
fn test_clean_content_allows() {
    let content = shotlist(vec![
        shot("s001_shot_001", "The sun rises over the hill"),
        shot("s001_shot_002", "Lena waves from the balcony"),
    ]);
    let snapshot = snapshot_with_dead_lena().to_value();

    // Lena is dead in the snapshot, but nothing references APPEARS:char_lena.
    let decision = evaluate_shotlist(&content, Some(&snapshot), &PolicyTokens::default())
        .expect("evaluate should succeed");

    assert_eq!(decision.decision, Decision::Allow);
    assert!(decision.reasons.is_empty());
    assert_eq!(decision.timing_lock_hash, "e".repeat(64));
}
