//! Bridge wire protocol
//!
//! One newline-terminated ASCII command per connection, one line back.
//! Any response starting with `ERROR` is a failure whatever the command.

use std::fmt;
use std::time::Duration;

/// Literal that marks a failed response
pub const ERROR_PREFIX: &str = "ERROR";

/// Field separator of a STATUS response
const STATUS_SEPARATOR: char = '|';

/// Commands understood by the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    /// Liveness check, answered with `PONG`
    Ping,
    /// Header for an upload; the source bytes follow the header line
    SendSource { name: String, len: usize },
    /// Start compiling a previously sent source
    Compile { id: String, name: String },
    /// Ask for the state of a compile job
    Status { id: String },
}

impl BridgeCommand {
    /// Verb as it appears on the wire
    pub fn verb(&self) -> &'static str {
        match self {
            BridgeCommand::Ping => "PING",
            BridgeCommand::SendSource { .. } => "SEND_SOURCE",
            BridgeCommand::Compile { .. } => "COMPILE",
            BridgeCommand::Status { .. } => "STATUS",
        }
    }
}

impl fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeCommand::Ping => write!(f, "PING"),
            BridgeCommand::SendSource { name, len } => write!(f, "SEND_SOURCE {} {}", name, len),
            BridgeCommand::Compile { id, name } => write!(f, "COMPILE {} {}", id, name),
            BridgeCommand::Status { id } => write!(f, "STATUS {}", id),
        }
    }
}

/// Result of one request/response exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl CommandOutcome {
    /// Classify a response line
    pub fn from_response(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.starts_with(ERROR_PREFIX) {
            Self::failure(line)
        } else {
            CommandOutcome {
                success: true,
                output: Some(line.to_string()),
                error: None,
            }
        }
    }

    /// A failure that never produced a response line
    pub fn failure(error: impl Into<String>) -> Self {
        CommandOutcome {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Error text, or a generic one when none was recorded
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown bridge error")
    }
}

/// Job state reported by STATUS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Completed,
    Failed,
    /// Anything else: `RUNNING`, `PENDING`, `QUEUED`, or unknown words
    Pending(String),
}

impl JobState {
    fn parse(word: &str) -> Self {
        match word.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" => JobState::Completed,
            "FAILED" => JobState::Failed,
            other => JobState::Pending(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending(_))
    }
}

/// Parsed `state|outputPath|durationMs|errorMessage|errorDetails` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub state: JobState,
    pub output_path: String,
    pub duration: Duration,
    pub error_message: String,
    pub error_details: String,
}

impl StatusLine {
    /// Parse a STATUS response.
    ///
    /// Missing trailing fields are empty and an unparsable duration is zero,
    /// so any line parses; an unknown state word ends up as `Pending`.
    pub fn parse(line: &str) -> Self {
        let mut fields = line.trim().splitn(5, STATUS_SEPARATOR);
        let state = JobState::parse(fields.next().unwrap_or_default());
        let output_path = fields.next().unwrap_or_default().trim().to_string();
        let duration_ms = fields
            .next()
            .and_then(|ms| ms.trim().parse::<u64>().ok())
            .unwrap_or(0);
        let error_message = fields.next().unwrap_or_default().trim().to_string();
        let error_details = decode_details(fields.next().unwrap_or_default().trim());

        StatusLine {
            state,
            output_path,
            duration: Duration::from_millis(duration_ms),
            error_message,
            error_details,
        }
    }
}

/// Multi-line compiler output travels with `\n` written as two characters
fn decode_details(raw: &str) -> String {
    raw.replace("\\n", "\n")
}
