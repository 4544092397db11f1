//! Compilation status poller
//!
//! Issues `STATUS <id>` at a fixed interval until the bridge reports a
//! terminal state or the attempt ceiling is reached. No backoff, no jitter.

use std::time::Duration;
use tracing::{debug, info, warn};

use kedit_core::{BridgeSettings, CompilationMessage, CompilationResult, FailureKind, Severity};

use crate::protocol::{BridgeCommand, JobState, StatusLine};
use crate::transport::BridgeTransport;

/// Message of the result returned when polling gives up
pub const POLL_TIMEOUT_MESSAGE: &str = "Compilation timed out waiting for the desktop bridge";

/// Terminal outcome of a polling run
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    pub result: CompilationResult,
    /// Number of STATUS commands sent
    pub attempts: u32,
}

/// Fixed-interval status poller
#[derive(Debug, Clone)]
pub struct StatusPoller {
    interval: Duration,
    max_attempts: u32,
}

impl StatusPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_settings(settings: &BridgeSettings) -> Self {
        Self::new(settings.poll_interval(), settings.max_poll_attempts)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Poll until success, reported failure, or the attempt ceiling
    pub async fn poll<T>(&self, transport: &T, id: &str) -> PollOutcome
    where
        T: BridgeTransport + ?Sized,
    {
        let command = BridgeCommand::Status { id: id.to_string() }.to_string();

        for attempt in 1..=self.max_attempts {
            let outcome = transport.send(&command).await;

            match outcome.output.as_deref() {
                Some(line) if outcome.success => {
                    let status = StatusLine::parse(line);
                    match status.state {
                        JobState::Completed => {
                            info!("Job {} completed after {} poll(s)", id, attempt);
                            return PollOutcome {
                                result: Self::success(status),
                                attempts: attempt,
                            };
                        }
                        JobState::Failed => {
                            info!("Job {} failed after {} poll(s)", id, attempt);
                            return PollOutcome {
                                result: Self::failure(status),
                                attempts: attempt,
                            };
                        }
                        JobState::Pending(ref word) => {
                            debug!("Job {} poll {}/{}: {}", id, attempt, self.max_attempts, word);
                        }
                    }
                }
                _ => {
                    debug!(
                        "Job {} poll {}/{} failed: {}",
                        id,
                        attempt,
                        self.max_attempts,
                        outcome.error_text()
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        warn!("Job {} still pending after {} polls", id, self.max_attempts);
        PollOutcome {
            result: Self::timeout(self.max_attempts, self.interval),
            attempts: self.max_attempts,
        }
    }

    fn success(status: StatusLine) -> CompilationResult {
        // A COMPLETED line may carry compiler warnings in the details field
        let warnings = CompilationMessage::parse_all(&status.error_details, Severity::Warning);
        CompilationResult::Success {
            output_path: status.output_path,
            duration: status.duration,
            warnings,
        }
    }

    fn failure(status: StatusLine) -> CompilationResult {
        let errors = CompilationMessage::parse_all(&status.error_details, Severity::Error);
        let message = if status.error_message.is_empty() {
            "Compilation failed".to_string()
        } else {
            status.error_message
        };
        CompilationResult::Error {
            kind: FailureKind::Compiler,
            message,
            details: status.error_details,
            errors,
        }
    }

    pub(crate) fn timeout(attempts: u32, interval: Duration) -> CompilationResult {
        CompilationResult::error(
            FailureKind::Timeout,
            POLL_TIMEOUT_MESSAGE,
            format!(
                "No result after {} status checks, {} ms apart",
                attempts,
                interval.as_millis()
            ),
        )
    }
}

impl Default for StatusPoller {
    fn default() -> Self {
        Self::from_settings(&BridgeSettings::default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::CommandOutcome;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Transport answering from a script; repeats `fallback` once exhausted
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<CommandOutcome>>,
        fallback: CommandOutcome,
        pub(crate) sent: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(lines: &[&str], fallback: &str) -> Self {
            Self::with_outcomes(
                lines.iter().map(|l| CommandOutcome::from_response(l)).collect(),
                CommandOutcome::from_response(fallback),
            )
        }

        pub(crate) fn with_outcomes(responses: Vec<CommandOutcome>, fallback: CommandOutcome) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                fallback,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn sent_commands(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(c, _)| c.clone()).collect()
        }
    }

    #[async_trait]
    impl BridgeTransport for ScriptedTransport {
        async fn send_with_payload(&self, command: &str, payload: &[u8]) -> CommandOutcome {
            self.sent.lock().push((command.to_string(), payload.len()));
            let next = self.responses.lock().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn fast_poller(max_attempts: u32) -> StatusPoller {
        StatusPoller::new(Duration::from_millis(1), max_attempts)
    }

    #[tokio::test]
    async fn test_completes_after_n_plus_one_polls() {
        let n = 4;
        let mut script = vec!["RUNNING"; n];
        script.push("COMPLETED|p|100");
        let transport = ScriptedTransport::new(&script, "ERROR: script exhausted");

        let outcome = fast_poller(60).poll(&transport, "job1").await;

        assert_eq!(outcome.attempts, n as u32 + 1);
        assert_eq!(transport.sent_commands().len(), n + 1);
        assert!(transport.sent_commands().iter().all(|c| c == "STATUS job1"));
        match outcome.result {
            CompilationResult::Success { output_path, duration, warnings } => {
                assert_eq!(output_path, "p");
                assert_eq!(duration, Duration::from_millis(100));
                assert!(warnings.is_empty());
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reported_failure() {
        let transport = ScriptedTransport::new(&["FAILED|| |msg|det"], "RUNNING");
        let outcome = fast_poller(10).poll(&transport, "job2").await;

        assert_eq!(outcome.attempts, 1);
        match outcome.result {
            CompilationResult::Error { kind, message, details, .. } => {
                assert_eq!(kind, FailureKind::Compiler);
                assert_eq!(message, "msg");
                assert_eq!(details, "det");
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_details_become_messages() {
        let transport = ScriptedTransport::new(
            &["FAILED||830|Kotlin compilation failed|Main.kt:2:9: error: unresolved reference: pritnln\\nMain.kt:3:1: warning: unused"],
            "RUNNING",
        );
        let outcome = fast_poller(3).poll(&transport, "job").await;

        match outcome.result {
            CompilationResult::Error { errors, .. } => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].line, Some(2));
                assert_eq!(errors[1].severity, Severity::Warning);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completed_warnings() {
        let transport = ScriptedTransport::new(
            &["COMPLETED|out/Main.jar|2100||Main.kt:4:9: warning: variable 'x' is never used"],
            "RUNNING",
        );
        let outcome = fast_poller(3).poll(&transport, "job").await;
        match outcome.result {
            CompilationResult::Success { warnings, .. } => {
                assert_eq!(warnings.len(), 1);
                assert_eq!(warnings[0].severity, Severity::Warning);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_times_out_on_running() {
        let transport = ScriptedTransport::new(&[], "RUNNING");
        let outcome = fast_poller(5).poll(&transport, "job3").await;

        assert_eq!(outcome.attempts, 5);
        assert_eq!(transport.sent_commands().len(), 5);
        assert_eq!(outcome.result.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(outcome.result.summary(), POLL_TIMEOUT_MESSAGE);
    }

    #[tokio::test]
    async fn test_transport_errors_and_garbage_keep_polling() {
        let transport = ScriptedTransport::with_outcomes(
            vec![
                CommandOutcome::failure("connection refused"),
                CommandOutcome::from_response("ERROR: Job job4 not found"),
                CommandOutcome::from_response("who knows"),
            ],
            CommandOutcome::failure("connection refused"),
        );
        let outcome = fast_poller(4).poll(&transport, "job4").await;

        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.result.failure_kind(), Some(FailureKind::Timeout));
        // Distinct from what a compiler failure would say
        assert_ne!(outcome.result.summary(), "Compilation failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_interval_between_polls() {
        let transport = ScriptedTransport::new(&["RUNNING", "RUNNING"], "COMPLETED|x|1");
        let poller = StatusPoller::new(Duration::from_secs(1), 10);

        let started = tokio::time::Instant::now();
        let outcome = poller.poll(&transport, "job5").await;

        assert_eq!(outcome.attempts, 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    }
}
