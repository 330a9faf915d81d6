// Execution Module
// Sweep orchestration: configuration, progress events, case generation, and
// the per-sweep executor.

pub mod config;
pub mod events;
pub mod executor;
pub mod generator;

pub use config::{CheckpointConfig, ContinuationMode, GenerationConfig, SweepConfig};
pub use events::{progress_channel, EventSender, ProgressReceiver, ProgressSender, SweepEvent};
pub use executor::{
    completed_cases, CaseResult, CaseStatus, SweepExecutor, SweepSummary, INTERRUPTED_EXIT_CODE,
};
pub use generator::CaseGenerator;
