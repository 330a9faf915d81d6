// Case Discovery
// Rescans a sweep directory into ordered case descriptors. Tolerant by
// design: one malformed entry is diagnosed and skipped, never aborting the
// scan, and inputs nested one directory level deeper are still found.

use std::path::{Path, PathBuf};

use crate::cases::models::CaseDescriptor;
use crate::error::{SweepError, SweepResult};
use crate::naming::parse_case_index;

/// Scan a sweep root for case directories, sorted ascending by the numeric
/// index embedded in each directory name (`case_2` before `case_10`). Only an
/// unreadable root is fatal.
pub fn scan(sweep_root: &Path, extension: &str) -> SweepResult<Vec<CaseDescriptor>> {
    let entries = std::fs::read_dir(sweep_root).map_err(|e| SweepError::io(sweep_root, e))?;

    let mut descriptors = Vec::new();
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let dir_name = match dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let index = match parse_case_index(&dir_name) {
            Some(index) => index,
            // Not a case directory (no embedded index); not worth a diagnostic.
            None => continue,
        };

        match describe_case(&dir, index, extension) {
            Some(descriptor) => descriptors.push(descriptor),
            None => {
                eprintln!(
                    "warning: skipping case directory without a usable input file: {}",
                    dir.display()
                );
            }
        }
    }

    descriptors.sort_by_key(|d| d.index);
    Ok(descriptors)
}

/// Build a descriptor for one case directory, looking one level deeper when
/// the inputs are nested. Returns `None` for partially populated directories.
fn describe_case(dir: &Path, index: usize, extension: &str) -> Option<CaseDescriptor> {
    if let Some(descriptor) = describe_flat(dir, index, extension) {
        return Some(descriptor);
    }

    // Legacy layouts sometimes nest the inputs one level down; the nested
    // directory becomes the working directory for the run.
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let nested = entry.path();
        if nested.is_dir() {
            if let Some(descriptor) = describe_flat(&nested, index, extension) {
                return Some(descriptor);
            }
        }
    }
    None
}

fn describe_flat(dir: &Path, index: usize, extension: &str) -> Option<CaseDescriptor> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut sub_file: Option<PathBuf> = None;

    for entry in std::fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let file_name = path.file_name()?.to_str()?.to_string();
        if file_name.starts_with("sub_") {
            if sub_file.is_none() {
                sub_file = Some(path);
            }
        } else {
            inputs.push(path);
        }
    }
    if inputs.is_empty() {
        return None;
    }

    // Deterministic choice: a main_-prefixed file wins, then name order.
    inputs.sort();
    let main_file = inputs
        .iter()
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("main_"))
                .unwrap_or(false)
        })
        .cloned()
        .unwrap_or_else(|| inputs[0].clone());

    let stem = main_file.file_stem()?.to_str()?;
    let name = stem.strip_prefix("main_").unwrap_or(stem).to_string();
    let multi_app = sub_file.is_some();

    Some(CaseDescriptor {
        index,
        name,
        dir: dir.to_path_buf(),
        main_file,
        sub_file,
        multi_app,
    })
}
