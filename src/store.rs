//! Durable per-project canon persistence: snapshot + append-only diff log.
//!
//! Layout under `<base_dir>/<project_id>/`:
//!
//! ```text
//! CanonSnapshot.json              <- current state (always latest)
//! history/
//!     0001_<episode_id>.diff.json <- immutable once written; one per accepted diff
//!     0002_<episode_id>.diff.json
//! violations/
//!     <episode_id>_CanonViolationReport.json
//! ```
//!
//! Sequence numbers are supplied by the caller (orchestrator), never derived
//! from directory contents, so parallel episode runs cannot race on the
//! numbering. The store does no in-process locking; two writers on the same
//! sequence number are rejected by the duplicate-sequence guard.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::canon::{apply_canon_diff, canonical_json, Canon};

/// Errors from project-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no CanonSnapshot found for project '{project_id}' at {}", .path.display())]
    SnapshotNotFound { project_id: String, path: PathBuf },

    #[error("history entry already exists for seq={seq} in project '{project_id}': {}", .path.display())]
    Conflict {
        seq: u32,
        project_id: String,
        path: PathBuf,
    },

    #[error("no history entries found for project '{0}'")]
    HistoryNotFound(String),

    #[error("episode '{episode_id}' not found in history for project '{project_id}'")]
    EpisodeNotFound {
        episode_id: String,
        project_id: String,
    },
}

/// Per-project durable store for canon state and its diff history.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    project_id: String,
    base_dir: PathBuf,
}

impl ProjectStore {
    /// Create a store handle for `project_id` under `base_dir`.
    ///
    /// No directories are created until the first save.
    pub fn new(project_id: impl Into<String>, base_dir: impl AsRef<Path>) -> Self {
        Self {
            project_id: project_id.into(),
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Stable project identifier this store is keyed by.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn project_dir(&self) -> PathBuf {
        self.base_dir.join(&self.project_id)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.project_dir().join("CanonSnapshot.json")
    }

    fn history_dir(&self) -> PathBuf {
        self.project_dir().join("history")
    }

    fn violations_dir(&self) -> PathBuf {
        self.project_dir().join("violations")
    }

    fn diff_filename(episode_seq: u32, episode_id: &str) -> String {
        format!("{episode_seq:04}_{episode_id}.diff.json")
    }

    /// Load the current canon snapshot for this project.
    pub fn load_canon(&self) -> Result<Canon, StoreError> {
        let path = self.snapshot_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::SnapshotNotFound {
                    project_id: self.project_id.clone(),
                    path,
                });
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist an accepted diff and update the project snapshot.
    ///
    /// Write order: the immutable history diff file first, the snapshot
    /// overwrite second. A crash between the two leaves the diff durably
    /// recorded while the previous, still self-consistent snapshot survives;
    /// replay can always reconstruct the latest state.
    ///
    /// Re-using an already-written sequence number is a
    /// [`StoreError::Conflict`], never an overwrite.
    pub fn save_canon(
        &self,
        canon: &Canon,
        diff: &Value,
        episode_id: &str,
        episode_seq: u32,
    ) -> Result<(), StoreError> {
        let history_dir = self.history_dir();
        fs::create_dir_all(&history_dir)?;

        let diff_path = history_dir.join(Self::diff_filename(episode_seq, episode_id));
        if diff_path.exists() {
            return Err(StoreError::Conflict {
                seq: episode_seq,
                project_id: self.project_id.clone(),
                path: diff_path,
            });
        }

        fs::write(&diff_path, canonical_json(diff)?)?;
        fs::write(self.snapshot_path(), canonical_json(canon)?)?;
        Ok(())
    }

    /// Write a violation report to the project's `violations/` directory and
    /// return the written path.
    pub fn save_violation_report(
        &self,
        report: &Value,
        episode_id: &str,
    ) -> Result<PathBuf, StoreError> {
        let violations_dir = self.violations_dir();
        fs::create_dir_all(&violations_dir)?;

        let out_path = violations_dir.join(format!("{episode_id}_CanonViolationReport.json"));
        fs::write(&out_path, canonical_json(report)?)?;
        Ok(out_path)
    }

    /// Replay history diffs to reconstruct the canon state at `episode_id`.
    ///
    /// Diffs are replayed in filename (sequence) order from an empty canon
    /// through the apply pipeline, stopping after the first filename that
    /// contains `episode_id`. History holds only accepted diffs, so a diff
    /// that re-errors during replay is skipped rather than fatal.
    pub fn canon_at_episode(&self, episode_id: &str) -> Result<Canon, StoreError> {
        let history_dir = self.history_dir();
        if !history_dir.is_dir() {
            return Err(StoreError::HistoryNotFound(self.project_id.clone()));
        }

        let mut diff_files: Vec<PathBuf> = fs::read_dir(&history_dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(".diff.json"))
            })
            .collect();
        diff_files.sort();

        if diff_files.is_empty() {
            return Err(StoreError::HistoryNotFound(self.project_id.clone()));
        }

        let mut canon = Canon::new();
        for diff_file in &diff_files {
            let diff: Value = serde_json::from_str(&fs::read_to_string(diff_file)?)?;
            let (next, _errors) = apply_canon_diff(&canon, &diff);
            canon = next;
            let matched = diff_file
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(episode_id));
            if matched {
                return Ok(canon);
            }
        }

        Err(StoreError::EpisodeNotFound {
            episode_id: episode_id.to_string(),
            project_id: self.project_id.clone(),
        })
    }
}
