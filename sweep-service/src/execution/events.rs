// Sweep Events
// Progress reporting and event types for sweep generation and execution

use std::time::Duration;

use tokio::sync::mpsc;

use crate::execution::executor::CaseStatus;

/// Sender for sweep progress events
pub type ProgressSender = mpsc::UnboundedSender<SweepEvent>;

/// Receiver for sweep progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<SweepEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during generation and execution
#[derive(Debug, Clone)]
pub enum SweepEvent {
    /// Case generation started
    GenerationStarted {
        total_combinations: usize,
        coupled: bool,
    },

    /// One case directory was materialized
    CaseGenerated { index: usize, name: String },

    /// Sweep execution started
    SweepStarted { total_cases: usize },

    /// Sweep execution completed
    SweepCompleted {
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },

    /// Case execution started
    CaseStarted {
        index: usize,
        name: String,
        recovering: bool,
    },

    /// Case execution completed
    CaseCompleted {
        index: usize,
        name: String,
        status: CaseStatus,
        exit_code: Option<i32>,
        duration: Duration,
    },

    /// Case was skipped (already completed, or a prior attempt failed)
    CaseSkipped {
        index: usize,
        name: String,
        reason: String,
    },

    /// Operator interrupt observed; progress has been flushed
    Interrupted { completed: usize },

    /// Diagnostic message
    Log { level: LogLevel, message: String },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl SweepEvent {
    /// Create a case started event
    pub fn case_started(index: usize, name: impl Into<String>, recovering: bool) -> Self {
        Self::CaseStarted {
            index,
            name: name.into(),
            recovering,
        }
    }

    /// Create a case completed event
    pub fn case_completed(
        index: usize,
        name: impl Into<String>,
        status: CaseStatus,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> Self {
        Self::CaseCompleted {
            index,
            name: name.into(),
            status,
            exit_code,
            duration,
        }
    }

    /// Create a case skipped event
    pub fn case_skipped(index: usize, name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CaseSkipped {
            index,
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an info log event
    pub fn info(message: impl Into<String>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    /// Create a warning log event
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: SweepEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: SweepEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: SweepEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel() {
        let (tx, mut rx) = progress_channel();

        tx.send_event(SweepEvent::SweepStarted { total_cases: 3 });
        tx.send_event(SweepEvent::case_started(1, "Gf8_le5e-5", false));

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, SweepEvent::SweepStarted { .. }));

        let event2 = rx.recv().await.unwrap();
        assert!(matches!(event2, SweepEvent::CaseStarted { .. }));
    }

    #[test]
    fn test_event_construction() {
        let event = SweepEvent::case_completed(
            2,
            "Gf10_le1e-4",
            CaseStatus::Succeeded,
            Some(0),
            Duration::from_secs(30),
        );

        if let SweepEvent::CaseCompleted {
            index,
            name,
            status,
            exit_code,
            duration,
        } = event
        {
            assert_eq!(index, 2);
            assert_eq!(name, "Gf10_le1e-4");
            assert_eq!(status, CaseStatus::Succeeded);
            assert_eq!(exit_code, Some(0));
            assert_eq!(duration, Duration::from_secs(30));
        } else {
            panic!("wrong event type");
        }
    }

    #[test]
    fn test_optional_sender() {
        let sender: Option<ProgressSender> = None;
        // Should not panic
        sender.send_event(SweepEvent::info("test"));
    }
}
