//! Shot-list content contract: capability traits and concrete v1 models.
//!
//! The decision engine accepts anything exposing the right attributes, not
//! one concrete type, so multiple producer versions interoperate. The traits
//! here model that contract: every text accessor is optional and defaults to
//! `None`, and absence of a field or sub-object must never fail a scan.

use serde::{Deserialize, Serialize};

/// Optional nested camera sub-object on a shot.
pub trait CameraSource {
    fn framing_hint(&self) -> Option<&str> {
        None
    }
    fn movement(&self) -> Option<&str> {
        None
    }
}

/// Optional audio-intent sub-object on a shot.
pub trait AudioSource {
    fn vo_text(&self) -> Option<&str> {
        None
    }
    fn vo_speaker_id(&self) -> Option<&str> {
        None
    }
}

/// One shot's scannable surface. Only `shot_id` is required; every text
/// field is optional so older and newer producer models both satisfy the
/// contract.
pub trait ShotSource {
    fn shot_id(&self) -> &str;

    fn action_beat(&self) -> Option<&str> {
        None
    }
    fn environment_notes(&self) -> Option<&str> {
        None
    }
    fn camera_framing(&self) -> Option<&str> {
        None
    }
    fn camera_movement(&self) -> Option<&str> {
        None
    }
    /// Forward-compat: not in the current concrete model.
    fn action_summary(&self) -> Option<&str> {
        None
    }
    /// Forward-compat nested camera object.
    fn camera(&self) -> Option<&dyn CameraSource> {
        None
    }
    fn audio_intent(&self) -> Option<&dyn AudioSource> {
        None
    }
}

/// A scannable shot-list: shots plus the identity fields the decision
/// engine requires before any scan.
pub trait ShotListSource {
    type Shot: ShotSource;

    fn shots(&self) -> &[Self::Shot];
    fn timing_lock_hash(&self) -> Option<&str> {
        None
    }
    fn schema_id(&self) -> Option<&str> {
        None
    }
    fn schema_version(&self) -> Option<&str> {
        None
    }
}

// ---------------------------------------------------------------------------
// Concrete v1 models
// ---------------------------------------------------------------------------

/// Audio intent for a shot: VO reference, SFX tags, and music mood.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioIntent {
    #[serde(default)]
    pub vo_text: Option<String>,
    #[serde(default)]
    pub vo_speaker_id: Option<String>,
    #[serde(default)]
    pub sfx_tags: Vec<String>,
    #[serde(default)]
    pub music_mood: Option<String>,
}

impl AudioSource for AudioIntent {
    fn vo_text(&self) -> Option<&str> {
        self.vo_text.as_deref()
    }
    fn vo_speaker_id(&self) -> Option<&str> {
        self.vo_speaker_id.as_deref()
    }
}

/// A character's appearance within a single shot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterInShot {
    pub character_id: String,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub pose: Option<String>,
}

/// A single film shot. `duration_sec` participates in the timing lock;
/// everything else is creative metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shot {
    pub shot_id: String,
    pub scene_id: String,
    pub duration_sec: f64,
    #[serde(default)]
    pub camera_framing: String,
    #[serde(default)]
    pub camera_movement: String,
    #[serde(default)]
    pub characters: Vec<CharacterInShot>,
    #[serde(default)]
    pub environment_notes: String,
    #[serde(default)]
    pub action_beat: String,
    #[serde(default)]
    pub audio_intent: AudioIntent,
    #[serde(default)]
    pub emotional_tag: Option<String>,
    #[serde(default)]
    pub shot_template_id: Option<String>,
}

impl ShotSource for Shot {
    fn shot_id(&self) -> &str {
        &self.shot_id
    }
    fn action_beat(&self) -> Option<&str> {
        Some(&self.action_beat)
    }
    fn environment_notes(&self) -> Option<&str> {
        Some(&self.environment_notes)
    }
    fn camera_framing(&self) -> Option<&str> {
        Some(&self.camera_framing)
    }
    fn camera_movement(&self) -> Option<&str> {
        Some(&self.camera_movement)
    }
    fn audio_intent(&self) -> Option<&dyn AudioSource> {
        Some(&self.audio_intent)
    }
}

/// Film-ready shot breakdown derived from a script. `timing_lock_hash` is
/// the single timing authority for everything downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotList {
    #[serde(default = "default_schema_id")]
    pub schema_id: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub shotlist_id: String,
    pub script_id: String,
    #[serde(default)]
    pub episode_id: Option<String>,
    #[serde(default)]
    pub shots: Vec<Shot>,
    #[serde(default)]
    pub total_duration_sec: f64,
    pub timing_lock_hash: String,
    pub created_at: String,
}

fn default_schema_id() -> String {
    "ShotList".to_string()
}

fn default_schema_version() -> String {
    "1.0.0".to_string()
}

impl ShotListSource for ShotList {
    type Shot = Shot;

    fn shots(&self) -> &[Shot] {
        &self.shots
    }
    fn timing_lock_hash(&self) -> Option<&str> {
        Some(&self.timing_lock_hash)
    }
    fn schema_id(&self) -> Option<&str> {
        Some(&self.schema_id)
    }
    fn schema_version(&self) -> Option<&str> {
        Some(&self.schema_version)
    }
}
