// Simulation Runner
// Launches the external simulation executable under the multi-worker launcher
// and supervises it: combined output is drained line-by-line into three sinks
// (console, timestamped log append, in-memory buffer) in receipt order, and a
// deadline interleaves with the read loop so a hung run cannot block forever.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{SweepError, SweepResult};

/// Exit code reported when a run is terminated by the per-case deadline.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code reported when the child died without one (killed by a signal).
const SIGNALED_EXIT_CODE: i32 = -2;

/// How long a timed-out child gets to die before the hard kill.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Result of one supervised run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub elapsed: Duration,
    /// Everything the child wrote, both streams, in receipt order. The log
    /// file holds the same lines with timestamps and is the durable copy.
    pub output: String,
    pub timed_out: bool,
}

/// Runner bound to one executable, launcher, and worker count.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    launcher: PathBuf,
    executable: PathBuf,
    worker_count: usize,
}

impl SimulationRunner {
    pub fn new(
        launcher: impl Into<PathBuf>,
        executable: impl Into<PathBuf>,
        worker_count: usize,
    ) -> Self {
        Self {
            launcher: launcher.into(),
            executable: executable.into(),
            worker_count: worker_count.max(1),
        }
    }

    /// Full command line for a run: `<launcher> -n <workers> <executable>
    /// <args...>`, or the bare executable when a single worker is enough.
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        let mut cmd = Vec::with_capacity(args.len() + 4);
        if self.worker_count > 1 {
            cmd.push(self.launcher.to_string_lossy().into_owned());
            cmd.push("-n".to_string());
            cmd.push(self.worker_count.to_string());
        }
        cmd.push(self.executable.to_string_lossy().into_owned());
        cmd.extend(args.iter().cloned());
        cmd
    }

    /// Run the executable in `cwd`, streaming output until the child exits or
    /// the deadline fires. `append_log` keeps the existing log (recovery);
    /// otherwise the log is overwritten for a fresh attempt.
    pub async fn run(
        &self,
        args: &[String],
        cwd: &Path,
        log_path: &Path,
        timeout: Option<Duration>,
        append_log: bool,
    ) -> SweepResult<RunOutcome> {
        let command_line = self.command_line(args);
        let command_text = command_line.join(" ");

        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(append_log)
            .write(true)
            .truncate(!append_log)
            .open(log_path)
            .map_err(|e| SweepError::io(log_path, e))?;

        let started = jiff::Zoned::now().strftime("%Y-%m-%d %H:%M:%S").to_string();
        writeln!(
            log,
            "=== run {} {} ===",
            if append_log { "resumed" } else { "started" },
            started
        )
        .and_then(|_| writeln!(log, "command: {}", command_text))
        .and_then(|_| writeln!(log, "cwd: {}", cwd.display()))
        .and_then(|_| writeln!(log))
        .map_err(|e| SweepError::io(log_path, e))?;

        println!("running: {}", command_text);

        let mut cmd = Command::new(&command_line[0]);
        cmd.args(&command_line[1..])
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The launcher spawns worker processes; give the run its own process
        // group so a timeout can take all of them down.
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            SweepError::Environment(format!(
                "failed to spawn '{}': {}",
                command_line[0], e
            ))
        })?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            let tx = line_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = line_tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }
        drop(line_tx);

        let deadline = timeout.map(|t| start + t);
        let mut output = String::new();
        let mut timed_out = false;

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, line_rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                },
                None => line_rx.recv().await,
            };
            match next {
                Some(line) => {
                    self.append_line(&mut log, log_path, &mut output, &line)?;
                }
                None => break,
            }
        }

        let exit_code = if timed_out {
            let limit = timeout.unwrap_or_default();
            println!("run timed out after {:.0}s, terminating", limit.as_secs_f64());
            terminate(&mut child).await;
            // Drain whatever the readers managed to forward before the kill.
            while let Ok(line) = line_rx.try_recv() {
                self.append_line(&mut log, log_path, &mut output, &line)?;
            }
            writeln!(log, "\ntimed out after {:.0}s", limit.as_secs_f64())
                .map_err(|e| SweepError::io(log_path, e))?;
            TIMEOUT_EXIT_CODE
        } else {
            let status = child
                .wait()
                .await
                .map_err(|e| SweepError::io(log_path, e))?;
            status.code().unwrap_or(SIGNALED_EXIT_CODE)
        };

        let elapsed = start.elapsed();
        writeln!(
            log,
            "\n=== run finished ===\nexit code: {}\nelapsed: {:.1}s",
            exit_code,
            elapsed.as_secs_f64()
        )
        .map_err(|e| SweepError::io(log_path, e))?;

        Ok(RunOutcome {
            exit_code,
            elapsed,
            output,
            timed_out,
        })
    }

    fn append_line(
        &self,
        log: &mut std::fs::File,
        log_path: &Path,
        output: &mut String,
        line: &str,
    ) -> SweepResult<()> {
        let stamp = jiff::Zoned::now().strftime("%H:%M:%S");
        println!("[{}] {}", stamp, line);
        writeln!(log, "[{}] {}", stamp, line).map_err(|e| SweepError::io(log_path, e))?;
        output.push_str(line);
        output.push('\n');
        Ok(())
    }
}

/// Terminate a timed-out child: signal its process group first (the launcher's
/// workers live there too), then hard-kill the child if it survives the grace
/// period.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        let _ = Command::new("kill")
            .arg("-TERM")
            .arg(format!("-{}", pid))
            .status()
            .await;
    }
    let _ = child.start_kill();
    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        let _ = child.kill().await;
        let _ = child.wait().await;
    }
}
