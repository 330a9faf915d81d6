// Bounded Parallel Commands
// Runs independent commands with a cap on concurrency. A polling loop keeps
// the active set full: finished children are reaped, new ones started, and a
// per-command deadline converts a hung child into a timeout outcome without
// stalling the rest of the batch.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::error::{SweepError, SweepResult};
use crate::runners::simulation::TIMEOUT_EXIT_CODE;

/// Poll interval for the active-set loop.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One command to run: program, arguments, working directory, and an optional
/// per-command deadline.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
}

/// Outcome of one command, tagged with its position in the submitted batch.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub index: usize,
    pub exit_code: i32,
    pub elapsed: Duration,
    pub timed_out: bool,
}

struct ActiveCommand {
    index: usize,
    child: Child,
    started: Instant,
    deadline: Option<Instant>,
}

/// Run `specs` with at most `max_parallel` children alive at once. Outcomes
/// come back sorted by submission index. A spawn failure aborts the batch
/// after the already-running children are reaped.
pub async fn run_bounded(
    specs: &[CommandSpec],
    max_parallel: usize,
) -> SweepResult<Vec<CommandOutcome>> {
    let max_parallel = max_parallel.max(1);
    let mut pending = specs.iter().enumerate();
    let mut active: Vec<ActiveCommand> = Vec::with_capacity(max_parallel);
    let mut outcomes: Vec<CommandOutcome> = Vec::with_capacity(specs.len());
    let mut spawn_error: Option<SweepError> = None;

    loop {
        // Top up the active set.
        while spawn_error.is_none() && active.len() < max_parallel {
            let Some((index, spec)) = pending.next() else {
                break;
            };
            match spawn(spec) {
                Ok(child) => {
                    let started = Instant::now();
                    active.push(ActiveCommand {
                        index,
                        child,
                        started,
                        deadline: spec.timeout.map(|t| started + t),
                    });
                }
                Err(e) => {
                    spawn_error = Some(e);
                }
            }
        }
        if active.is_empty() {
            break;
        }

        // Reap finished and timed-out children.
        let mut i = 0;
        while i < active.len() {
            let entry = &mut active[i];
            match entry.child.try_wait() {
                Ok(Some(status)) => {
                    let entry = active.swap_remove(i);
                    outcomes.push(CommandOutcome {
                        index: entry.index,
                        exit_code: status.code().unwrap_or(-2),
                        elapsed: entry.started.elapsed(),
                        timed_out: false,
                    });
                }
                Ok(None) if entry.deadline.is_some_and(|d| Instant::now() >= d) => {
                    let mut entry = active.swap_remove(i);
                    let _ = entry.child.kill().await;
                    let _ = entry.child.wait().await;
                    outcomes.push(CommandOutcome {
                        index: entry.index,
                        exit_code: TIMEOUT_EXIT_CODE,
                        elapsed: entry.started.elapsed(),
                        timed_out: true,
                    });
                }
                Ok(None) => {
                    i += 1;
                }
                Err(e) => {
                    let entry = active.swap_remove(i);
                    outcomes.push(CommandOutcome {
                        index: entry.index,
                        exit_code: -2,
                        elapsed: entry.started.elapsed(),
                        timed_out: false,
                    });
                    eprintln!("warning: wait failed for command {}: {}", entry.index, e);
                }
            }
        }

        if !active.is_empty() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    if let Some(e) = spawn_error {
        return Err(e);
    }
    outcomes.sort_by_key(|o| o.index);
    Ok(outcomes)
}

fn spawn(spec: &CommandSpec) -> SweepResult<Child> {
    Command::new(&spec.program)
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            SweepError::Environment(format!("failed to spawn '{}': {}", spec.program, e))
        })
}
