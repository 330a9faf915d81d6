// Progress Store
// Persists the set of completed case identifiers so an interrupted sweep can
// resume without re-running finished work. Writes replace the file wholesale;
// there is no incremental patching to corrupt.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{SweepError, SweepResult};

/// Fixed progress artifact filename under the sweep root.
pub const PROGRESS_FILE: &str = ".sweep_progress.json";

/// Completed-case tracker for one sweep root. Owned exclusively by the single
/// orchestrator running the sweep.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(sweep_root: &Path) -> Self {
        Self {
            path: sweep_root.join(PROGRESS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the completed-case set. A missing or unreadable artifact yields an
    /// empty set with a warning, never an error: worst case the sweep re-runs
    /// work it already finished.
    pub fn load(&self) -> HashSet<String> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashSet::new(),
            Err(e) => {
                eprintln!(
                    "warning: could not read progress file {}: {}",
                    self.path.display(),
                    e
                );
                return HashSet::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&text) {
            Ok(cases) => cases.into_iter().collect(),
            Err(e) => {
                eprintln!(
                    "warning: malformed progress file {}: {}",
                    self.path.display(),
                    e
                );
                HashSet::new()
            }
        }
    }

    /// Replace the artifact with the given set. Entries are sorted so the file
    /// is stable across runs that completed the same cases.
    pub fn save(&self, completed: &HashSet<String>) -> SweepResult<()> {
        let mut cases: Vec<&String> = completed.iter().collect();
        cases.sort();
        let text = serde_json::to_string(&cases)
            .map_err(|e| SweepError::Configuration(format!("progress serialization: {}", e)))?;
        std::fs::write(&self.path, text).map_err(|e| SweepError::io(&self.path, e))
    }

    /// Remove the artifact once a sweep finishes with nothing pending, so a
    /// later, logically new sweep at the same path does not mis-skip cases.
    pub fn clear(&self) -> SweepResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SweepError::io(&self.path, e)),
        }
    }
}
