// Runners Module
// External-process execution: the supervised per-case simulation runner and a
// bounded-parallelism utility for independent command pipelines.

pub mod parallel;
pub mod simulation;

pub use parallel::{run_bounded, CommandOutcome, CommandSpec};
pub use simulation::{RunOutcome, SimulationRunner, TIMEOUT_EXIT_CODE};
