// Error types for sweep generation and execution
// One tagged enum instead of an exception hierarchy; the orchestrator decides
// which variants are fatal and which are recorded per case.

use std::path::PathBuf;

use thiserror::Error;

/// All failure categories the sweep engine can report.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Malformed matrix, exclusion list, or structured argument. Fatal before
    /// any case is touched.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing or unreadable template. Fatal for generation.
    #[error("template error for {path}: {message}")]
    Template { path: PathBuf, message: String },

    /// Directory or file operation failed. Fatal per case, except the sweep's
    /// first case.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A case run failed (non-zero exit, timeout, or a failed/unknown
    /// classification). Recorded per case; only propagated in abort-on-failure
    /// mode.
    #[error("simulation error in case '{case}': {message}")]
    Simulation { case: String, message: String },

    /// Executable or launcher missing/unusable. Checked once before any case
    /// runs.
    #[error("environment error: {0}")]
    Environment(String),
}

impl SweepError {
    /// Attach path context to a raw io error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn template(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Template {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn simulation(case: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Simulation {
            case: case.into(),
            message: message.into(),
        }
    }
}

/// Result type for sweep operations.
pub type SweepResult<T> = Result<T, SweepError>;
