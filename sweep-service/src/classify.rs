// Convergence Classification
// Derives a case outcome from unstructured solver log text. Marker-based and
// pure, so a later offline pass over the persisted log reproduces the exact
// classification the orchestrator saw.

use std::path::Path;

/// Outcome derived from a case log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    /// The solve finished and no failure marker appeared.
    Converged,
    /// A failure marker appeared; the reason names which one.
    Failed(String),
    /// Neither a completion nor a failure marker was found (crash before the
    /// footer, truncated log, or a run still in flight).
    Unknown,
}

const NOT_CONVERGED_MARKER: &str = "Solve Did NOT Converge!";
const SOLVE_FAILED_MARKER: &str = "Solve Failed!";
const SEVERE_ERROR_MARKER: &str = "*** ERROR ***";
const FINISHED_MARKER: &str = "Finished Executing";

/// Classify log text. Failure markers win over the completion marker, so a run
/// that reports a failed solve and still prints its footer counts as failed.
pub fn classify(log_text: &str) -> Convergence {
    if log_text.contains(NOT_CONVERGED_MARKER) {
        return Convergence::Failed("solve did not converge".to_string());
    }
    if log_text.contains(SOLVE_FAILED_MARKER) {
        return Convergence::Failed("solve failed".to_string());
    }
    if log_text.contains(SEVERE_ERROR_MARKER) {
        return Convergence::Failed("error".to_string());
    }
    if log_text.contains(FINISHED_MARKER) {
        return Convergence::Converged;
    }
    Convergence::Unknown
}

/// Classify directly from a persisted log artifact.
pub fn classify_file(path: &Path) -> std::io::Result<Convergence> {
    let text = std::fs::read_to_string(path)?;
    Ok(classify(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_marker_wins() {
        let log = "Time Step 12\nSolve Did NOT Converge!\nFinished Executing\n";
        assert_eq!(
            classify(log),
            Convergence::Failed("solve did not converge".to_string())
        );
    }

    #[test]
    fn test_converged() {
        let log = "Time Step 40\n Solve Converged!\nFinished Executing\n";
        assert_eq!(classify(log), Convergence::Converged);
    }

    #[test]
    fn test_severe_error() {
        let log = "*** ERROR ***\nThe following required parameters are missing\n";
        assert_eq!(classify(log), Convergence::Failed("error".to_string()));
    }

    #[test]
    fn test_solve_failed() {
        assert_eq!(
            classify("Solve Failed!\n"),
            Convergence::Failed("solve failed".to_string())
        );
    }

    #[test]
    fn test_unknown_without_markers() {
        assert_eq!(classify("Time Step 3, dt = 100\n"), Convergence::Unknown);
        assert_eq!(classify(""), Convergence::Unknown);
    }

    #[test]
    fn test_classify_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, "Finished Executing\n").unwrap();
        assert_eq!(classify_file(&path).unwrap(), Convergence::Converged);
    }
}
