// Sweep Service Library
// Parameter-sweep execution engine for simulation campaigns: expands a
// parameter matrix into self-contained case directories, runs each case under
// process supervision, classifies outcomes from log text, and persists
// progress so an interrupted sweep resumes where it stopped.

pub mod cases;
pub mod checkpoint;
pub mod classify;
pub mod error;
pub mod execution;
pub mod matrix;
pub mod naming;
pub mod progress;
pub mod runners;
pub mod template;

// Re-export commonly used types
pub use error::{SweepError, SweepResult};

// Re-export matrix types
pub use matrix::{ExclusionRule, MatrixExpander, ParameterCombination, ParameterMatrix};

// Re-export case types
pub use cases::{scan, write_case, CaseDescriptor};

// Re-export classification types
pub use classify::{classify, classify_file, Convergence};

// Re-export execution types
pub use execution::{
    progress_channel, CaseGenerator, CaseResult, CaseStatus, CheckpointConfig, ContinuationMode,
    EventSender, GenerationConfig, ProgressReceiver, ProgressSender, SweepConfig, SweepEvent,
    SweepExecutor, SweepSummary, INTERRUPTED_EXIT_CODE,
};

// Re-export runner types
pub use runners::{run_bounded, CommandOutcome, CommandSpec, RunOutcome, SimulationRunner};

// Re-export progress store
pub use progress::ProgressStore;
