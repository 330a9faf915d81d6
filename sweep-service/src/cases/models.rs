// Case Descriptor
// One materialized, independently executable case. Produced either at
// materialization time or by rescanning a sweep directory; both derivations
// agree on naming.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDescriptor {
    /// Numeric case index embedded in the directory name.
    pub index: usize,
    /// Short parameter-derived case name.
    pub name: String,
    /// Case directory; the working directory for the run.
    pub dir: PathBuf,
    /// Main input file inside `dir`.
    pub main_file: PathBuf,
    /// Coupled sub-app input file, when present.
    pub sub_file: Option<PathBuf>,
    /// True when the case runs a main description plus a coupled sub.
    pub multi_app: bool,
}

impl CaseDescriptor {
    /// Stable case identifier: the directory path relative to the sweep root.
    /// Used as the progress-store key.
    pub fn id(&self, sweep_root: &Path) -> String {
        self.dir
            .strip_prefix(sweep_root)
            .unwrap_or(&self.dir)
            .to_string_lossy()
            .into_owned()
    }

    /// File name of the main input, as passed to the executable (`-i <name>`).
    pub fn main_file_name(&self) -> String {
        self.main_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
