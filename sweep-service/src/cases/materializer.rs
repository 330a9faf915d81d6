// Case Materializer
// Writes one self-contained case directory from rendered template text.

use std::path::Path;

use crate::cases::models::CaseDescriptor;
use crate::error::{SweepError, SweepResult};
use crate::naming::case_dir_name;

/// Materialize one case directory under the sweep root. Coupled mode writes
/// `main_<name>.<ext>` plus `sub_<name>.<ext>`; single-app mode drops the
/// `main_` prefix and removes any stray sub file a prior coupled generation
/// left behind, so downstream discovery never has to special-case uncoupled
/// sweeps.
pub fn write_case(
    sweep_root: &Path,
    index: usize,
    name: &str,
    main_text: &str,
    sub_text: Option<&str>,
    extension: &str,
) -> SweepResult<CaseDescriptor> {
    let dir = sweep_root.join(case_dir_name(index, name));
    std::fs::create_dir_all(&dir).map_err(|e| SweepError::io(&dir, e))?;

    let main_path = dir.join(format!("main_{}.{}", name, extension));
    std::fs::write(&main_path, main_text).map_err(|e| SweepError::io(&main_path, e))?;

    let sub_path = dir.join(format!("sub_{}.{}", name, extension));
    match sub_text {
        Some(text) => {
            std::fs::write(&sub_path, text).map_err(|e| SweepError::io(&sub_path, e))?;
            Ok(CaseDescriptor {
                index,
                name: name.to_string(),
                dir,
                main_file: main_path,
                sub_file: Some(sub_path),
                multi_app: true,
            })
        }
        None => {
            let bare_path = dir.join(format!("{}.{}", name, extension));
            std::fs::rename(&main_path, &bare_path)
                .map_err(|e| SweepError::io(&bare_path, e))?;
            match std::fs::remove_file(&sub_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SweepError::io(&sub_path, e)),
            }
            Ok(CaseDescriptor {
                index,
                name: name.to_string(),
                dir,
                main_file: bare_path,
                sub_file: None,
                multi_app: false,
            })
        }
    }
}
