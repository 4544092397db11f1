//! Compiler bridge client
//!
//! Runs the compile flows on top of a transport and the status poller, and
//! folds every failure into a `CompilationResult`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use kedit_core::{
    BridgeSettings, CompilationResult, CompilationState, CompilationTracker, FailureKind,
};

use crate::poller::{StatusPoller, POLL_TIMEOUT_MESSAGE};
use crate::protocol::{BridgeCommand, CommandOutcome, StatusLine};
use crate::transport::{BridgeTransport, TcpTransport};

/// Source extensions the desktop bridge knows how to compile
pub const SUPPORTED_EXTENSIONS: &[&str] = &["kt", "kts", "java"];

/// Client for the desktop compiler bridge
pub struct CompilerBridge<T: BridgeTransport = TcpTransport> {
    transport: T,
    poller: StatusPoller,
    compile_timeout: Duration,
    tracker: Arc<CompilationTracker>,
}

impl CompilerBridge<TcpTransport> {
    /// Build a TCP client from configured settings
    pub fn from_settings(settings: &BridgeSettings, tracker: Arc<CompilationTracker>) -> Self {
        Self::new(TcpTransport::from_settings(settings), tracker)
            .with_poller(StatusPoller::from_settings(settings))
            .with_compile_timeout(settings.compile_timeout())
    }
}

impl<T: BridgeTransport> CompilerBridge<T> {
    /// Create a client over `transport`, publishing progress to `tracker`
    pub fn new(transport: T, tracker: Arc<CompilationTracker>) -> Self {
        let defaults = BridgeSettings::default();
        Self {
            transport,
            poller: StatusPoller::from_settings(&defaults),
            compile_timeout: defaults.compile_timeout(),
            tracker,
        }
    }

    pub fn with_poller(mut self, poller: StatusPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_compile_timeout(mut self, compile_timeout: Duration) -> Self {
        self.compile_timeout = compile_timeout;
        self
    }

    pub fn tracker(&self) -> Arc<CompilationTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Check that the bridge answers `PONG`
    pub async fn ping(&self) -> CommandOutcome {
        let outcome = self.transport.send(&BridgeCommand::Ping.to_string()).await;
        match outcome.output.as_deref() {
            Some(line) if outcome.success && line.trim() == "PONG" => outcome,
            Some(line) if outcome.success => {
                CommandOutcome::failure(format!("unexpected ping response: {}", line))
            }
            _ => outcome,
        }
    }

    /// Upload a source file to the bridge workspace
    pub async fn send_source(&self, name: &str, source: &str) -> CommandOutcome {
        let header = BridgeCommand::SendSource {
            name: name.to_string(),
            len: source.len(),
        };
        self.transport
            .send_with_payload(&header.to_string(), source.as_bytes())
            .await
    }

    /// Query a job once without polling
    pub async fn status(&self, id: &str) -> Result<StatusLine, CommandOutcome> {
        let outcome = self.transport.send(&BridgeCommand::Status { id: id.to_string() }.to_string()).await;
        match outcome.output.as_deref() {
            Some(line) if outcome.success => Ok(StatusLine::parse(line)),
            _ => Err(outcome),
        }
    }

    /// Compile a source already present on the bridge and wait for the result.
    ///
    /// Does not touch the tracker; `compile_source` drives the observable state.
    pub async fn compile(&self, id: &str, filename: &str) -> CompilationResult {
        if let Err(result) = validate_filename(filename) {
            return result;
        }

        let command = BridgeCommand::Compile {
            id: id.to_string(),
            name: filename.to_string(),
        };
        let ack = self.transport.send(&command.to_string()).await;
        if !ack.success {
            warn!("Compile request {} rejected: {}", id, ack.error_text());
            return ack_failure("Failed to start compilation", &ack);
        }
        debug!("Compile request {} acknowledged: {:?}", id, ack.output);

        match tokio::time::timeout(self.compile_timeout, self.poller.poll(&self.transport, id)).await {
            Ok(outcome) => outcome.result,
            Err(_) => {
                warn!("Compile request {} exceeded {:?}", id, self.compile_timeout);
                CompilationResult::error(
                    FailureKind::Timeout,
                    POLL_TIMEOUT_MESSAGE,
                    format!("No result within {} s", self.compile_timeout.as_secs()),
                )
            }
        }
    }

    /// Full flow behind the editor's "Compile" action: validate, upload,
    /// compile, poll. Every step is published on the tracker.
    pub async fn compile_source(&self, filename: &str, source: &str) -> CompilationResult {
        let id = new_request_id();
        self.tracker.begin(&id);
        info!("Compiling {} as request {}", filename, id);

        let result = self.run_compile(&id, filename, source).await;

        if let Err(e) = self.tracker.finish(&id, result.clone()) {
            // Another request took over the tracker while this one ran
            debug!("Result of {} not published: {}", id, e);
        }
        result
    }

    async fn run_compile(&self, id: &str, filename: &str, source: &str) -> CompilationResult {
        if let Err(result) = validate_filename(filename) {
            return result;
        }
        if source.trim().is_empty() {
            return CompilationResult::validation("Source code must not be empty");
        }

        if self.tracker.advance(id, CompilationState::SendingFiles).is_err() {
            return superseded();
        }
        let upload = self.send_source(filename, source).await;
        if !upload.success {
            warn!("Upload of {} failed: {}", filename, upload.error_text());
            return ack_failure("Failed to send source to the desktop bridge", &upload);
        }

        if self.tracker.advance(id, CompilationState::Compiling).is_err() {
            return superseded();
        }
        self.compile(id, filename).await
    }
}

/// Fresh 8-character request id
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn validate_filename(filename: &str) -> Result<(), CompilationResult> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(CompilationResult::validation("File name must not be empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(CompilationResult::validation(format!(
            "File name must not contain spaces: {}",
            trimmed
        )));
    }

    let extension = Path::new(trimmed)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        Some(ext) => Err(CompilationResult::validation(format!(
            "Unsupported file extension: .{}",
            ext
        ))),
        None => Err(CompilationResult::validation(format!(
            "File name has no extension: {}",
            trimmed
        ))),
    }
}

/// Turn a failed acknowledgement into a result, keeping transport and
/// protocol failures apart
fn ack_failure(message: &str, outcome: &CommandOutcome) -> CompilationResult {
    let details = outcome.error_text();
    let kind = if details.starts_with(crate::protocol::ERROR_PREFIX) {
        FailureKind::Protocol
    } else {
        FailureKind::Transport
    };
    CompilationResult::error(kind, message, details)
}

fn superseded() -> CompilationResult {
    CompilationResult::error(
        FailureKind::Superseded,
        "Compilation was replaced by a newer request",
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::tests::ScriptedTransport;
    use kedit_core::{Event, EventBus};

    fn bridge(transport: ScriptedTransport) -> CompilerBridge<ScriptedTransport> {
        CompilerBridge::new(transport, Arc::new(CompilationTracker::default()))
            .with_poller(StatusPoller::new(Duration::from_millis(1), 5))
    }

    #[tokio::test]
    async fn test_compile_source_happy_path() {
        let bus = Arc::new(EventBus::new());
        let sub = bus.subscribe();
        let tracker = Arc::new(CompilationTracker::new(Arc::clone(&bus)));
        let transport = ScriptedTransport::new(
            &["OK", "OK", "RUNNING", "COMPLETED|/work/output/Main.jar|1543"],
            "ERROR: unexpected",
        );
        let bridge = CompilerBridge::new(transport, Arc::clone(&tracker))
            .with_poller(StatusPoller::new(Duration::from_millis(1), 5));

        let source = "fun main() {\n    println(\"hi\")\n}\n";
        let result = bridge.compile_source("Main.kt", source).await;

        assert_eq!(result.output_path(), Some("/work/output/Main.jar"));
        assert_eq!(tracker.state(), CompilationState::Success);
        assert_eq!(tracker.result(), Some(result));

        let sent = bridge.transport().sent.lock().clone();
        let id = tracker.snapshot().request_id.unwrap();
        assert_eq!(id.len(), 8);
        assert_eq!(sent[0], (format!("SEND_SOURCE Main.kt {}", source.len()), source.len()));
        assert_eq!(sent[1].0, format!("COMPILE {} Main.kt", id));
        assert_eq!(sent[2].0, format!("STATUS {}", id));
        assert_eq!(sent.len(), 4);

        let states: Vec<CompilationState> = sub
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::CompilationStateChanged(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                CompilationState::Preparing,
                CompilationState::SendingFiles,
                CompilationState::Compiling,
                CompilationState::Success,
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_transport() {
        let bridge = bridge(ScriptedTransport::new(&[], "OK"));

        for (name, source) in [("", "fun main() {}"), ("   ", "x"), ("Main.kt", ""), ("Main.kt", " \n ")] {
            let result = bridge.compile_source(name, source).await;
            assert_eq!(result.failure_kind(), Some(FailureKind::Validation), "{name:?}/{source:?}");
            assert_eq!(bridge.tracker().state(), CompilationState::Error);
        }
        assert!(bridge.transport().sent_commands().is_empty());
    }

    #[test]
    fn test_validation_completes_synchronously() {
        let bridge = bridge(ScriptedTransport::new(&[], "OK"));
        // Validation fails before the first await point
        let result = tokio_test::block_on(bridge.compile("x", ""));
        assert_eq!(result.failure_kind(), Some(FailureKind::Validation));
        assert!(bridge.transport().sent_commands().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let bridge = bridge(ScriptedTransport::new(&[], "OK"));
        let result = bridge.compile_source("script.py", "print(1)").await;
        assert_eq!(result.summary(), "Unsupported file extension: .py");
        assert!(bridge.transport().sent_commands().is_empty());
    }

    #[tokio::test]
    async fn test_failed_ack_skips_polling() {
        let bridge = bridge(ScriptedTransport::new(&["ERROR: compiler busy"], "RUNNING"));
        let result = bridge.compile("abc", "Main.java").await;

        assert_eq!(result.failure_kind(), Some(FailureKind::Protocol));
        match &result {
            CompilationResult::Error { details, .. } => assert_eq!(details, "ERROR: compiler busy"),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(bridge.transport().sent_commands(), vec!["COMPILE abc Main.java"]);
    }

    #[tokio::test]
    async fn test_upload_transport_failure() {
        let transport = ScriptedTransport::with_outcomes(
            vec![CommandOutcome::failure("Could not connect to 127.0.0.1:8765: refused")],
            CommandOutcome::from_response("OK"),
        );
        let bridge = bridge(transport);
        let result = bridge.compile_source("Main.kt", "fun main() {}").await;

        assert_eq!(result.failure_kind(), Some(FailureKind::Transport));
        assert_eq!(bridge.transport().sent_commands().len(), 1);
        assert_eq!(bridge.tracker().state(), CompilationState::Error);
    }

    #[tokio::test]
    async fn test_compiler_failure_vs_timeout() {
        let failing = bridge(ScriptedTransport::new(&["OK", "FAILED||900|Kotlin compilation failed|boom"], "RUNNING"));
        let reported = failing.compile("a", "Main.kt").await;

        let stuck = bridge(ScriptedTransport::new(&["OK"], "RUNNING"));
        let timed_out = stuck.compile("b", "Main.kt").await;

        assert_eq!(reported.failure_kind(), Some(FailureKind::Compiler));
        assert_eq!(timed_out.failure_kind(), Some(FailureKind::Timeout));
        assert_ne!(reported.summary(), timed_out.summary());
        // COMPILE plus the full attempt ceiling
        assert_eq!(stuck.transport().sent_commands().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_timeout() {
        let bridge = CompilerBridge::new(
            ScriptedTransport::new(&["OK"], "RUNNING"),
            Arc::new(CompilationTracker::default()),
        )
        .with_poller(StatusPoller::new(Duration::from_secs(10), 1_000))
        .with_compile_timeout(Duration::from_secs(30));

        let result = bridge.compile("slow", "Main.kt").await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
        assert!(bridge.transport().sent_commands().len() < 10);
    }

    #[tokio::test]
    async fn test_replaced_request_stops_before_upload() {
        let bridge = bridge(ScriptedTransport::new(&[], "OK"));
        bridge.tracker().begin("newer");

        let result = bridge.run_compile("older", "Main.kt", "fun main() {}").await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Superseded));
        assert!(bridge.transport().sent_commands().is_empty());
        // The newer request still owns the tracker
        assert_eq!(bridge.tracker().snapshot().request_id.as_deref(), Some("newer"));
        assert_eq!(bridge.tracker().state(), CompilationState::Preparing);
    }

    #[tokio::test]
    async fn test_ping() {
        assert!(bridge(ScriptedTransport::new(&["PONG"], "")).ping().await.success);
        assert!(!bridge(ScriptedTransport::new(&["HELLO"], "")).ping().await.success);
        assert!(!bridge(ScriptedTransport::new(&["ERROR: no"], "")).ping().await.success);
    }

    #[tokio::test]
    async fn test_single_status() {
        let bridge = bridge(ScriptedTransport::new(&["RUNNING||||"], ""));
        let status = bridge.status("abc").await.unwrap();
        assert!(!status.state.is_terminal());
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("Main.kt").is_ok());
        assert!(validate_filename("Build.KTS").is_ok());
        assert!(validate_filename("App.java").is_ok());
        assert!(validate_filename("Makefile").is_err());
        assert!(validate_filename("my file.kt").is_err());
    }
}
