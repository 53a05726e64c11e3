//! History store backed by a JSON file
//!
//! There is no locking: one process, one run at a time.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::History;

/// Default history file name
pub const DEFAULT_HISTORY_FILE: &str = "history.json";

/// Loads and saves the alert history
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Create a store for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the history file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the history, or an empty one if the file does not exist yet
    pub fn load(&self) -> Result<History> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "History file does not exist");
                return Ok(History::default());
            }
            Err(e) => return Err(self.invalid(e)),
        };

        serde_json::from_str(&raw).map_err(|e| self.invalid(e))
    }

    /// Overwrite the history file with `history`
    ///
    /// The new content is written next to the file and renamed over it, so a
    /// crash mid-write leaves the previous history intact.
    pub fn save(&self, history: &History) -> Result<()> {
        debug!(path = %self.path.display(), "Updating history file");

        let json = serde_json::to_vec_pretty(history)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_HISTORY_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn invalid(&self, reason: impl ToString) -> Error {
        Error::History {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_FILE)
    }
}
