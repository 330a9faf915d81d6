// Sweep Configuration
// Explicit configuration passed at construction. The CLI layer that owns flag
// parsing builds these structs; nothing in the engine reads global paths.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::matrix::{ExclusionRule, ParameterMatrix};

/// Checkpoint directive parameters injected into every rendered main file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Time steps between checkpoint writes.
    pub time_step_interval: u32,
    /// Checkpoint generations kept on disk.
    pub num_files: u32,
    /// Wall-clock seconds between checkpoint writes.
    pub wall_seconds: u32,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            time_step_interval: 5,
            num_files: 4,
            wall_seconds: 600,
        }
    }
}

/// What a sweep does after a case fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContinuationMode {
    /// Record the failure and move to the next case (resumable mode).
    #[default]
    ContinueOnFailure,
    /// Stop the whole sweep at the first failed case (legacy mode).
    AbortOnFailure,
}

/// Configuration for the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Directory the case directories are materialized under.
    pub output_dir: PathBuf,
    /// Main input template.
    pub main_template: PathBuf,
    /// Coupled sub-app template; coupled mode is active when this is present
    /// and distinct from the main template.
    #[serde(default)]
    pub sub_template: Option<PathBuf>,
    /// Parameter axes to sweep.
    pub matrix: ParameterMatrix,
    /// Known-invalid combinations.
    #[serde(default)]
    pub exclusions: Vec<ExclusionRule>,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// End time recorded in headers when the template declares none.
    #[serde(default)]
    pub fallback_end_time: Option<f64>,
    /// Recreate the output directory before materializing.
    #[serde(default)]
    pub clean_output: bool,
    /// Input-file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Configuration for executing an already-materialized sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Directory holding the case directories.
    pub sweep_root: PathBuf,
    /// Simulation executable.
    pub executable: PathBuf,
    /// Multi-worker launcher; only consulted when `worker_count > 1`.
    #[serde(default = "default_launcher")]
    pub launcher: PathBuf,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Per-case deadline in seconds; absent means unbounded.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Skip cases already recorded in the progress store.
    #[serde(default = "default_true")]
    pub skip_completed: bool,
    /// Re-run cases whose existing log classifies as failed.
    #[serde(default)]
    pub rerun_failed: bool,
    #[serde(default)]
    pub continuation: ContinuationMode,
    /// Only run cases whose name contains this substring.
    #[serde(default)]
    pub case_filter: Option<String>,
    /// Run at most this many cases.
    #[serde(default)]
    pub max_cases: Option<usize>,
    /// Per-case log filename.
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
    /// Input-file extension, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Extra arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_extension() -> String {
    "i".to_string()
}

fn default_launcher() -> PathBuf {
    PathBuf::from("mpiexec")
}

fn default_worker_count() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_log_file_name() -> String {
    "run.log".to_string()
}
