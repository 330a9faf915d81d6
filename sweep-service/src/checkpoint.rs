// Checkpoint Location
// Finds the newest externally produced recovery artifact for a case. The
// injected output directive is named `my_checkpoint`, which the simulator
// materializes as a `<base>_my_checkpoint_cp` directory next to the input.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Directory-name suffix that marks a checkpoint artifact.
pub const CHECKPOINT_DIR_SUFFIX: &str = "_checkpoint_cp";

/// Return the newest checkpoint directory in a case directory, by modification
/// time. Absence is normal for a fresh sweep and maps to `None`, as do read
/// errors on the case directory itself.
pub fn find_latest_checkpoint(case_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(case_dir).ok()?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if !name.ends_with(CHECKPOINT_DIR_SUFFIX) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        match &newest {
            Some((best, _)) if *best >= modified => {}
            _ => newest = Some((modified, path)),
        }
    }

    newest.map(|(_, path)| path)
}
