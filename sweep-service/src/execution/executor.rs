// Sweep Executor
// Drives an already-materialized sweep case by case: skip decisions from the
// progress store and prior logs, checkpoint recovery, supervised runs,
// classification of the persisted log, and interrupt handling at loop
// boundaries. Cases run strictly sequentially; the launcher's worker
// processes are the only concurrency delegated downward.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cases::{scan, CaseDescriptor};
use crate::checkpoint::find_latest_checkpoint;
use crate::classify::{classify_file, Convergence};
use crate::error::{SweepError, SweepResult};
use crate::execution::config::{ContinuationMode, SweepConfig};
use crate::execution::events::{EventSender, ProgressSender, SweepEvent};
use crate::progress::ProgressStore;
use crate::runners::simulation::SimulationRunner;

/// Process exit code reported after an operator interrupt.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Lifecycle state of one case within a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
    TimedOut,
}

/// Outcome of one case.
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub descriptor: CaseDescriptor,
    pub status: CaseStatus,
    /// Failure or skip reason, when there is one.
    pub reason: Option<String>,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

/// Outcome of a whole sweep.
#[derive(Debug, Clone)]
pub struct SweepSummary {
    pub cases: Vec<CaseResult>,
    pub duration: Duration,
    pub interrupted: bool,
    /// 0 on full success, [`INTERRUPTED_EXIT_CODE`] after an interrupt,
    /// 1 when any case failed.
    pub exit_code: i32,
}

impl SweepSummary {
    pub fn count(&self, status: CaseStatus) -> usize {
        self.cases.iter().filter(|c| c.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(CaseStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(CaseStatus::Failed) + self.count(CaseStatus::TimedOut)
    }

    pub fn skipped(&self) -> usize {
        self.count(CaseStatus::Skipped)
    }
}

/// Sweep orchestrator. One instance owns the progress store and case logs of
/// its sweep root; concurrent executors against the same root are unsupported.
pub struct SweepExecutor {
    config: SweepConfig,
    event_tx: Option<ProgressSender>,
    interrupted: Arc<AtomicBool>,
}

impl SweepExecutor {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            event_tx: None,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Flag the caller sets to request a stop at the next case boundary.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Wire the interrupt flag to Ctrl-C.
    pub fn spawn_interrupt_handler(&self) {
        let flag = self.interrupt_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupt received, stopping after the current case");
                flag.store(true, Ordering::SeqCst);
            }
        });
    }

    /// Verify the executable and launcher before any case runs.
    pub fn check_environment(&self) -> SweepResult<()> {
        let executable = &self.config.executable;
        let metadata = std::fs::metadata(executable).map_err(|_| {
            SweepError::Environment(format!(
                "simulation executable not found: {}",
                executable.display()
            ))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(SweepError::Environment(format!(
                    "simulation executable is not executable: {}",
                    executable.display()
                )));
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        if self.config.worker_count > 1 {
            let launcher = &self.config.launcher;
            let found = if launcher.components().count() > 1 {
                launcher.exists()
            } else {
                which::which(launcher).is_ok()
            };
            if !found {
                return Err(SweepError::Environment(format!(
                    "launcher not found: {}",
                    launcher.display()
                )));
            }
        }
        Ok(())
    }

    /// Run the sweep. Returns `Err` only for fatal categories (environment,
    /// configuration, a first-case IO failure, or a case failure in
    /// abort-on-failure mode); per-case failures are recorded in the summary.
    pub async fn execute(&self) -> SweepResult<SweepSummary> {
        self.check_environment()?;

        let config = &self.config;
        let descriptors = self.select_cases()?;
        let store = ProgressStore::new(&config.sweep_root);
        let mut completed = store.load();
        let runner = SimulationRunner::new(
            config.launcher.clone(),
            config.executable.clone(),
            config.worker_count,
        );
        let timeout = config.timeout_seconds.map(Duration::from_secs);

        self.event_tx.send_event(SweepEvent::SweepStarted {
            total_cases: descriptors.len(),
        });

        let start = Instant::now();
        let mut results: Vec<CaseResult> = Vec::with_capacity(descriptors.len());
        let mut interrupted = false;

        for (position, descriptor) in descriptors.iter().enumerate() {
            if self.interrupted.load(Ordering::SeqCst) {
                store.save(&completed)?;
                self.event_tx.send_event(SweepEvent::Interrupted {
                    completed: completed.len(),
                });
                interrupted = true;
                break;
            }

            let id = descriptor.id(&config.sweep_root);
            if config.skip_completed && completed.contains(&id) {
                results.push(self.skip(descriptor, "already completed"));
                continue;
            }
            if !config.rerun_failed {
                if let Some(reason) = prior_failure(descriptor, &config.log_file_name) {
                    results.push(self.skip(
                        descriptor,
                        &format!("previous attempt failed: {}", reason),
                    ));
                    continue;
                }
            }

            let result = self
                .run_case(&runner, descriptor, position == 0, timeout)
                .await?;

            if result.status == CaseStatus::Succeeded {
                completed.insert(id);
                // Persisted before the next case starts, so a later crash
                // cannot lose this case's completion.
                store.save(&completed)?;
            }

            let failed = matches!(result.status, CaseStatus::Failed | CaseStatus::TimedOut);
            let reason = result.reason.clone();
            results.push(result);

            if failed && config.continuation == ContinuationMode::AbortOnFailure {
                store.save(&completed)?;
                return Err(SweepError::simulation(
                    descriptor.id(&config.sweep_root),
                    reason.unwrap_or_else(|| "case failed".to_string()),
                ));
            }
        }

        let duration = start.elapsed();
        let all_clear = !interrupted
            && results
                .iter()
                .all(|r| matches!(r.status, CaseStatus::Succeeded | CaseStatus::Skipped));
        if all_clear {
            store.clear()?;
        }

        let exit_code = if interrupted {
            INTERRUPTED_EXIT_CODE
        } else if all_clear {
            0
        } else {
            1
        };

        let summary = SweepSummary {
            cases: results,
            duration,
            interrupted,
            exit_code,
        };
        self.event_tx.send_event(SweepEvent::SweepCompleted {
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            skipped: summary.skipped(),
            duration,
        });
        Ok(summary)
    }

    /// Discover cases and apply the name filter and the max-cases cap.
    fn select_cases(&self) -> SweepResult<Vec<CaseDescriptor>> {
        let config = &self.config;
        let mut descriptors = scan(&config.sweep_root, &config.extension)?;
        if descriptors.is_empty() {
            return Err(SweepError::Configuration(format!(
                "no case directories under {}",
                config.sweep_root.display()
            )));
        }
        if let Some(filter) = &config.case_filter {
            descriptors.retain(|d| d.name.contains(filter.as_str()));
        }
        if let Some(max) = config.max_cases {
            descriptors.truncate(max);
        }
        Ok(descriptors)
    }

    async fn run_case(
        &self,
        runner: &SimulationRunner,
        descriptor: &CaseDescriptor,
        is_first: bool,
        timeout: Option<Duration>,
    ) -> SweepResult<CaseResult> {
        let config = &self.config;
        let log_path = descriptor.dir.join(&config.log_file_name);

        // The sweep's first case never recovers: with no prior progress the
        // checkpoint is presumed stale.
        let checkpoint = if is_first {
            None
        } else {
            find_latest_checkpoint(&descriptor.dir)
        };
        let recovering = checkpoint.is_some();

        let mut args = vec!["-i".to_string(), descriptor.main_file_name()];
        if let Some(checkpoint) = &checkpoint {
            if let Some(name) = checkpoint.file_name().and_then(|n| n.to_str()) {
                args.push("--recover".to_string());
                args.push(name.to_string());
            }
        }
        args.extend(config.extra_args.iter().cloned());

        self.event_tx.send_event(SweepEvent::case_started(
            descriptor.index,
            &descriptor.name,
            recovering,
        ));

        let outcome = match runner
            .run(&args, &descriptor.dir, &log_path, timeout, recovering)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if is_first => return Err(e),
            Err(e) => {
                eprintln!("warning: case {} did not start: {}", descriptor.name, e);
                return Ok(self.complete(
                    descriptor,
                    CaseStatus::Failed,
                    Some(e.to_string()),
                    None,
                    Duration::ZERO,
                ));
            }
        };

        // Classify from the durable artifact, not the in-memory buffer, so a
        // later offline pass over the log reproduces this exact outcome.
        let convergence = match classify_file(&log_path) {
            Ok(convergence) => convergence,
            Err(e) => {
                eprintln!(
                    "warning: could not read log {}: {}",
                    log_path.display(),
                    e
                );
                Convergence::Unknown
            }
        };

        let (status, reason) = if outcome.timed_out {
            (CaseStatus::TimedOut, Some("timed out".to_string()))
        } else {
            match convergence {
                Convergence::Converged if outcome.exit_code == 0 => (CaseStatus::Succeeded, None),
                Convergence::Converged => (
                    CaseStatus::Failed,
                    Some(format!("exit code {}", outcome.exit_code)),
                ),
                Convergence::Failed(reason) => (CaseStatus::Failed, Some(reason)),
                Convergence::Unknown => (
                    CaseStatus::Failed,
                    Some(format!(
                        "no completion marker (exit code {})",
                        outcome.exit_code
                    )),
                ),
            }
        };

        Ok(self.complete(
            descriptor,
            status,
            reason,
            Some(outcome.exit_code),
            outcome.elapsed,
        ))
    }

    fn skip(&self, descriptor: &CaseDescriptor, reason: &str) -> CaseResult {
        self.event_tx.send_event(SweepEvent::case_skipped(
            descriptor.index,
            &descriptor.name,
            reason,
        ));
        CaseResult {
            descriptor: descriptor.clone(),
            status: CaseStatus::Skipped,
            reason: Some(reason.to_string()),
            exit_code: None,
            duration: Duration::ZERO,
        }
    }

    fn complete(
        &self,
        descriptor: &CaseDescriptor,
        status: CaseStatus,
        reason: Option<String>,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> CaseResult {
        self.event_tx.send_event(SweepEvent::case_completed(
            descriptor.index,
            &descriptor.name,
            status,
            exit_code,
            duration,
        ));
        CaseResult {
            descriptor: descriptor.clone(),
            status,
            reason,
            exit_code,
            duration,
        }
    }
}

/// Reason from a prior attempt's log, when that log classifies as failed.
fn prior_failure(descriptor: &CaseDescriptor, log_file_name: &str) -> Option<String> {
    let log_path = descriptor.dir.join(log_file_name);
    match classify_file(&log_path) {
        Ok(Convergence::Failed(reason)) => Some(reason),
        _ => None,
    }
}

/// Completed-case ids currently recorded for a sweep root. Convenience for
/// callers reporting resume state before starting a sweep.
pub fn completed_cases(sweep_root: &std::path::Path) -> HashSet<String> {
    ProgressStore::new(sweep_root).load()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cases::write_case;
    use crate::progress::ProgressStore;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Stand-in simulator: converges unless its input file asks it to fail.
    const FAKE_SIMULATOR: &str = "\
#!/bin/sh
if grep -q 'mode = fail' \"$2\"; then
  echo 'Solve Did NOT Converge!'
  exit 1
fi
echo 'Finished Executing'
";

    fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn sweep_config(root: &Path, executable: PathBuf) -> SweepConfig {
        SweepConfig {
            sweep_root: root.to_path_buf(),
            executable,
            launcher: PathBuf::from("mpiexec"),
            worker_count: 1,
            timeout_seconds: None,
            skip_completed: true,
            rerun_failed: false,
            continuation: ContinuationMode::ContinueOnFailure,
            case_filter: None,
            max_cases: None,
            log_file_name: "run.log".to_string(),
            extension: "i".to_string(),
            extra_args: Vec::new(),
        }
    }

    fn make_cases(root: &Path, bodies: &[&str]) -> Vec<CaseDescriptor> {
        bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                write_case(root, i + 1, &format!("c{}", i + 1), body, None, "i").unwrap()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_sweep_clears_progress() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        make_cases(&root, &["dt = 1\n", "dt = 2\n"]);

        let summary = SweepExecutor::new(sweep_config(&root, exe))
            .execute()
            .await
            .unwrap();

        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.exit_code, 0);
        assert!(!summary.interrupted);
        assert!(!ProgressStore::new(&root).path().exists());
        assert!(root.join("case_001_c1/run.log").exists());
    }

    #[tokio::test]
    async fn test_skip_completed_cases() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        let cases = make_cases(&root, &["dt = 1\n", "dt = 2\n", "dt = 3\n"]);

        let store = ProgressStore::new(&root);
        let mut done = HashSet::new();
        done.insert(cases[0].id(&root));
        store.save(&done).unwrap();

        let summary = SweepExecutor::new(sweep_config(&root, exe))
            .execute()
            .await
            .unwrap();

        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.cases[0].status, CaseStatus::Skipped);
        // Skipped case never ran.
        assert!(!root.join("case_001_c1/run.log").exists());
        // Fully resolved sweep clears the artifact.
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_failed_case_keeps_progress() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        make_cases(&root, &["dt = 1\n", "mode = fail\n"]);

        let summary = SweepExecutor::new(sweep_config(&root, exe))
            .execute()
            .await
            .unwrap();

        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.exit_code, 1);
        assert_eq!(
            summary.cases[1].reason.as_deref(),
            Some("solve did not converge")
        );

        // The succeeded case survives for the next resume.
        let store = ProgressStore::new(&root);
        assert!(store.path().exists());
        assert_eq!(store.load().len(), 1);
    }

    #[tokio::test]
    async fn test_prior_failed_log_skips_case() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        let cases = make_cases(&root, &["dt = 1\n", "dt = 2\n"]);
        std::fs::write(cases[0].dir.join("run.log"), "Solve Failed!\n").unwrap();

        let summary = SweepExecutor::new(sweep_config(&root, exe.clone()))
            .execute()
            .await
            .unwrap();
        assert_eq!(summary.cases[0].status, CaseStatus::Skipped);
        assert!(summary.cases[0]
            .reason
            .as_deref()
            .unwrap()
            .contains("previous attempt failed"));

        // rerun_failed retries it.
        let mut config = sweep_config(&root, exe);
        config.rerun_failed = true;
        let summary = SweepExecutor::new(config).execute().await.unwrap();
        assert_eq!(summary.cases[0].status, CaseStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_abort_on_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        make_cases(&root, &["mode = fail\n", "dt = 2\n"]);

        let mut config = sweep_config(&root, exe);
        config.continuation = ContinuationMode::AbortOnFailure;
        let result = SweepExecutor::new(config).execute().await;
        assert!(matches!(result, Err(SweepError::Simulation { .. })));

        // The second case never started.
        assert!(!root.join("case_002_c2/run.log").exists());
    }

    #[tokio::test]
    async fn test_case_filter_and_max_cases() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        write_case(&root, 1, "Gf8", "dt = 1\n", None, "i").unwrap();
        write_case(&root, 2, "Gf10", "dt = 2\n", None, "i").unwrap();
        write_case(&root, 3, "Gf12", "dt = 3\n", None, "i").unwrap();

        let mut config = sweep_config(&root, exe.clone());
        config.case_filter = Some("Gf1".to_string());
        let summary = SweepExecutor::new(config).execute().await.unwrap();
        assert_eq!(summary.cases.len(), 2);

        let mut config = sweep_config(&root, exe);
        config.max_cases = Some(1);
        let summary = SweepExecutor::new(config).execute().await.unwrap();
        assert_eq!(summary.cases.len(), 1);
        assert_eq!(summary.cases[0].descriptor.name, "Gf8");
    }

    #[tokio::test]
    async fn test_interrupt_flag_stops_before_first_case() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        make_cases(&root, &["dt = 1\n"]);

        let executor = SweepExecutor::new(sweep_config(&root, exe));
        executor.interrupt_flag().store(true, Ordering::SeqCst);
        let summary = executor.execute().await.unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.exit_code, INTERRUPTED_EXIT_CODE);
        assert!(summary.cases.is_empty());
        // Interrupt flushed the (empty) progress set.
        assert!(ProgressStore::new(&root).path().exists());
    }

    #[tokio::test]
    async fn test_empty_root_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();

        let result = SweepExecutor::new(sweep_config(&root, exe)).execute().await;
        assert!(matches!(result, Err(SweepError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_check_environment() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();

        // Missing executable.
        let config = sweep_config(&root, dir.path().join("missing"));
        assert!(matches!(
            SweepExecutor::new(config).check_environment(),
            Err(SweepError::Environment(_))
        ));

        // Present but not executable.
        let plain = dir.path().join("plain");
        std::fs::write(&plain, "data").unwrap();
        let config = sweep_config(&root, plain);
        assert!(matches!(
            SweepExecutor::new(config).check_environment(),
            Err(SweepError::Environment(_))
        ));

        // Executable present, launcher missing, multiple workers.
        let exe = write_executable(dir.path(), "sim", FAKE_SIMULATOR);
        let mut config = sweep_config(&root, exe);
        config.worker_count = 4;
        config.launcher = dir.path().join("no-such-launcher");
        assert!(matches!(
            SweepExecutor::new(config).check_environment(),
            Err(SweepError::Environment(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_marks_case_timed_out() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_executable(dir.path(), "slow", "#!/bin/sh\nsleep 30\n");
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        make_cases(&root, &["dt = 1\n"]);

        let mut config = sweep_config(&root, exe);
        config.timeout_seconds = Some(1);
        let summary = SweepExecutor::new(config).execute().await.unwrap();

        assert_eq!(summary.cases[0].status, CaseStatus::TimedOut);
        assert_eq!(summary.failed(), 1);
    }

    #[tokio::test]
    async fn test_recovery_appends_log_after_first_case() {
        let dir = tempfile::tempdir().unwrap();
        // Echoes its arguments so the --recover flag is observable.
        let exe = write_executable(
            dir.path(),
            "sim",
            "#!/bin/sh\necho \"args: $@\"\necho 'Finished Executing'\n",
        );
        let root = dir.path().join("sweep");
        std::fs::create_dir(&root).unwrap();
        let cases = make_cases(&root, &["dt = 1\n", "dt = 2\n"]);

        // Second case has a checkpoint and a log from an earlier attempt.
        std::fs::create_dir(cases[1].dir.join("c2_my_checkpoint_cp")).unwrap();
        std::fs::write(cases[1].dir.join("run.log"), "earlier attempt\n").unwrap();

        let summary = SweepExecutor::new(sweep_config(&root, exe))
            .execute()
            .await
            .unwrap();
        assert_eq!(summary.succeeded(), 2);

        let log = std::fs::read_to_string(cases[1].dir.join("run.log")).unwrap();
        assert!(log.contains("earlier attempt"));
        assert!(log.contains("--recover c2_my_checkpoint_cp"));

        // First case: no recovery even if a checkpoint existed.
        let first_log = std::fs::read_to_string(cases[0].dir.join("run.log")).unwrap();
        assert!(!first_log.contains("--recover"));
    }
}
