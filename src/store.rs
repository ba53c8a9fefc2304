//! Checkpoint persistence
//!
//! One JSON record per compute type, overwritten wholesale on every save.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! crash mid-write leaves the previous checkpoint intact.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::progress::ProgressState;
use crate::{Error, Result};

/// On-disk form of a [`ProgressState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Solutions found so far
    #[serde(default)]
    pub count_solutions: u64,
    /// Trials run so far
    #[serde(default)]
    pub count_run: u64,
}

impl From<ProgressState> for CheckpointRecord {
    fn from(state: ProgressState) -> Self {
        Self {
            count_solutions: state.solutions_count,
            count_run: state.trials_run,
        }
    }
}

impl From<CheckpointRecord> for ProgressState {
    fn from(record: CheckpointRecord) -> Self {
        Self::new(record.count_solutions, record.count_run)
    }
}

/// Stateless checkpoint load/save service.
pub struct ProgressStore;

impl ProgressStore {
    /// Load the checkpoint at `path`, falling back to an empty state.
    ///
    /// A missing file is a fresh start. An unreadable or malformed file is
    /// logged and also treated as a fresh start.
    #[must_use]
    pub fn load(path: &Path) -> ProgressState {
        match Self::try_load(path) {
            Ok(Some(state)) => {
                debug!(path = %path.display(), ?state, "checkpoint loaded");
                state
            }
            Ok(None) => {
                debug!(path = %path.display(), "no checkpoint found, starting fresh");
                ProgressState::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring checkpoint, starting fresh");
                ProgressState::default()
            }
        }
    }

    /// Load the checkpoint at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::MalformedCheckpoint`] if it does not hold a consistent record.
    pub fn try_load(path: &Path) -> Result<Option<ProgressState>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: CheckpointRecord =
            serde_json::from_str(&content).map_err(|e| Error::MalformedCheckpoint {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let state = ProgressState::from(record);
        if !state.is_consistent() {
            return Err(Error::MalformedCheckpoint {
                path: path.to_path_buf(),
                reason: format!(
                    "{} solutions exceed {} trials",
                    state.solutions_count, state.trials_run
                ),
            });
        }
        Ok(Some(state))
    }

    /// Persist `state` to `path`; failures are logged and swallowed.
    pub fn save(path: &Path, state: ProgressState) {
        if let Err(e) = Self::try_save(path, state) {
            warn!(path = %path.display(), error = %e, "failed to save checkpoint");
        }
    }

    /// Persist `state` to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`] if writing, syncing or
    /// renaming fails. The previous checkpoint is left untouched.
    pub fn try_save(path: &Path, state: ProgressState) -> Result<()> {
        let json = serde_json::to_vec(&CheckpointRecord::from(state))?;
        let temp_path = temp_sibling(path);

        let written = write_synced(&temp_path, &json).and_then(|()| fs::rename(&temp_path, path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}
