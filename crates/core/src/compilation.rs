//! Compilation State and Results
//!
//! The value types a compile request produces, and the owned state holder
//! the UI layer observes while a request is in flight.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{KEditError, Result},
    events::{Event, EventBus},
};

/// Severity of a single compiler message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Parse the severity word compilers print (`error`, `warning`, `info`, `note`)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "error" | "e" | "fatal error" => Some(Severity::Error),
            "warning" | "w" => Some(Severity::Warning),
            "info" | "i" | "note" => Some(Severity::Info),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// One diagnostic line reported by the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationMessage {
    pub severity: Severity,
    pub text: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CompilationMessage {
    /// Parse one diagnostic line.
    ///
    /// Recognizes `file:line:col: severity: text` and `file:line: severity: text`.
    /// Anything else becomes an unlocated message with `fallback` severity.
    pub fn parse(line: &str, fallback: Severity) -> Self {
        let trimmed = line.trim();
        Self::parse_located(trimmed).unwrap_or_else(|| CompilationMessage {
            severity: Self::leading_severity(trimmed).unwrap_or(fallback),
            text: trimmed.to_string(),
            file: None,
            line: None,
            column: None,
        })
    }

    /// Parse every non-empty line of a details block
    pub fn parse_all(details: &str, fallback: Severity) -> Vec<Self> {
        details
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| Self::parse(l, fallback))
            .collect()
    }

    fn parse_located(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.splitn(5, ':').collect();
        if parts.len() < 4 {
            return None;
        }

        let file = parts[0].trim();
        let line_no: u32 = parts[1].trim().parse().ok()?;
        if file.is_empty() {
            return None;
        }

        // file:line:col: severity: text
        if let Ok(column) = parts[2].trim().parse::<u32>() {
            let severity = Severity::from_label(parts[3])?;
            let text = parts.get(4).map(|t| t.trim()).unwrap_or_default();
            return Some(CompilationMessage {
                severity,
                text: text.to_string(),
                file: Some(file.to_string()),
                line: Some(line_no),
                column: Some(column),
            });
        }

        // file:line: severity: text
        let severity = Severity::from_label(parts[2])?;
        let text = parts[3..].join(":");
        Some(CompilationMessage {
            severity,
            text: text.trim().to_string(),
            file: Some(file.to_string()),
            line: Some(line_no),
            column: None,
        })
    }

    fn leading_severity(line: &str) -> Option<Severity> {
        let (label, _) = line.split_once(':')?;
        Severity::from_label(label)
    }

    /// `file:line:col` prefix used when rendering the message
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        Some(match (self.line, self.column) {
            (Some(l), Some(c)) => format!("{}:{}:{}", file, l, c),
            (Some(l), None) => format!("{}:{}", file, l),
            _ => file.clone(),
        })
    }
}

impl fmt::Display for CompilationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location() {
            Some(location) => write!(f, "{}: {}: {}", location, self.severity.as_str(), self.text),
            None => write!(f, "{}: {}", self.severity.as_str(), self.text),
        }
    }
}

/// Why a compilation ended in an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Bad input rejected before anything was sent
    Validation,
    /// The bridge could not be reached
    Transport,
    /// The bridge answered with `ERROR` or something unparsable
    Protocol,
    /// The compiler ran and reported failure
    Compiler,
    /// No terminal status within the attempt ceiling or wall-clock limit
    Timeout,
    /// A newer request took over the tracker before this one finished
    Superseded,
}

/// Outcome of one compile request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompilationResult {
    Success {
        output_path: String,
        duration: Duration,
        warnings: Vec<CompilationMessage>,
    },
    Error {
        kind: FailureKind,
        message: String,
        details: String,
        errors: Vec<CompilationMessage>,
    },
}

impl CompilationResult {
    /// Build an error result with no parsed messages
    pub fn error(kind: FailureKind, message: impl Into<String>, details: impl Into<String>) -> Self {
        CompilationResult::Error {
            kind,
            message: message.into(),
            details: details.into(),
            errors: Vec::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::error(FailureKind::Validation, message, "")
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CompilationResult::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CompilationResult::Error { kind, .. } => Some(*kind),
            CompilationResult::Success { .. } => None,
        }
    }

    /// Output path of a successful compilation
    pub fn output_path(&self) -> Option<&str> {
        match self {
            CompilationResult::Success { output_path, .. } => Some(output_path),
            CompilationResult::Error { .. } => None,
        }
    }

    /// The failure as a [`KEditError`], `None` on success
    pub fn to_error(&self) -> Option<KEditError> {
        let CompilationResult::Error { kind, message, details, .. } = self else {
            return None;
        };
        let text = if details.is_empty() {
            message.clone()
        } else {
            format!("{} ({})", message, details)
        };
        Some(match kind {
            FailureKind::Validation => KEditError::Validation(message.clone()),
            FailureKind::Transport => KEditError::Bridge(text),
            FailureKind::Protocol => KEditError::Protocol(text),
            FailureKind::Compiler => KEditError::Compilation(message.clone()),
            FailureKind::Timeout => KEditError::Timeout(text),
            FailureKind::Superseded => KEditError::Cancelled,
        })
    }

    /// Headline for the result dialog
    pub fn summary(&self) -> String {
        match self {
            CompilationResult::Success { output_path, duration, warnings } => {
                if warnings.is_empty() {
                    format!("Compiled in {} ms: {}", duration.as_millis(), output_path)
                } else {
                    format!(
                        "Compiled in {} ms with {} warning(s): {}",
                        duration.as_millis(),
                        warnings.len(),
                        output_path
                    )
                }
            }
            CompilationResult::Error { message, .. } => message.clone(),
        }
    }
}

/// Progress of the current compile request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompilationState {
    Idle,
    Preparing,
    SendingFiles,
    Compiling,
    Success,
    Error,
}

impl CompilationState {
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            CompilationState::Preparing | CompilationState::SendingFiles | CompilationState::Compiling
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CompilationState::Success | CompilationState::Error)
    }

    /// Forward steps between in-progress states.
    ///
    /// Terminal states are not reachable here; they are entered with a result.
    pub fn can_advance_to(&self, next: CompilationState) -> bool {
        matches!(
            (self, next),
            (CompilationState::Preparing, CompilationState::SendingFiles)
                | (CompilationState::Preparing, CompilationState::Compiling)
                | (CompilationState::SendingFiles, CompilationState::Compiling)
        )
    }

    /// Label shown by the compile dialog
    pub fn label(&self) -> &'static str {
        match self {
            CompilationState::Idle => "Idle",
            CompilationState::Preparing => "Preparing...",
            CompilationState::SendingFiles => "Sending source to desktop...",
            CompilationState::Compiling => "Compiling...",
            CompilationState::Success => "Compilation succeeded",
            CompilationState::Error => "Compilation failed",
        }
    }
}

/// What observers see: the state, the last result and the request it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationSnapshot {
    pub state: CompilationState,
    pub result: Option<CompilationResult>,
    pub request_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for CompilationSnapshot {
    fn default() -> Self {
        Self {
            state: CompilationState::Idle,
            result: None,
            request_id: None,
            updated_at: Utc::now(),
        }
    }
}

/// Single-slot holder of the current compilation state.
///
/// Constructed explicitly and shared by `Arc`. A request begun while another
/// is in flight replaces it; the caller serializes writers.
pub struct CompilationTracker {
    snapshot: RwLock<CompilationSnapshot>,
    event_bus: Arc<EventBus>,
}

impl CompilationTracker {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            snapshot: RwLock::new(CompilationSnapshot::default()),
            event_bus,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> CompilationSnapshot {
        self.snapshot.read().clone()
    }

    pub fn state(&self) -> CompilationState {
        self.snapshot.read().state
    }

    pub fn result(&self) -> Option<CompilationResult> {
        self.snapshot.read().result.clone()
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Start a new request. Allowed from any state; the previous result is dropped.
    pub fn begin(&self, request_id: &str) {
        {
            let mut snapshot = self.snapshot.write();
            debug!("Compilation {} begins (was {:?})", request_id, snapshot.state);
            *snapshot = CompilationSnapshot {
                state: CompilationState::Preparing,
                result: None,
                request_id: Some(request_id.to_string()),
                updated_at: Utc::now(),
            };
        }
        self.publish(CompilationState::Preparing);
    }

    /// Move request `request_id` between in-progress states
    pub fn advance(&self, request_id: &str, next: CompilationState) -> Result<()> {
        {
            let mut snapshot = self.snapshot.write();
            Self::check_owner(&snapshot, request_id)?;
            if !snapshot.state.can_advance_to(next) {
                return Err(KEditError::InvalidState(format!(
                    "cannot move compilation from {:?} to {:?}",
                    snapshot.state, next
                )));
            }
            debug!("Compilation state: {:?} -> {:?}", snapshot.state, next);
            snapshot.state = next;
            snapshot.updated_at = Utc::now();
        }
        self.publish(next);
        Ok(())
    }

    /// Enter the terminal state matching `result` and store it
    pub fn finish(&self, request_id: &str, result: CompilationResult) -> Result<CompilationState> {
        let next = if result.is_success() {
            CompilationState::Success
        } else {
            CompilationState::Error
        };

        {
            let mut snapshot = self.snapshot.write();
            Self::check_owner(&snapshot, request_id)?;
            let allowed = match next {
                CompilationState::Success => snapshot.state == CompilationState::Compiling,
                _ => snapshot.state.is_in_progress(),
            };
            if !allowed {
                return Err(KEditError::InvalidState(format!(
                    "cannot finish compilation with {:?} from {:?}",
                    next, snapshot.state
                )));
            }
            debug!("Compilation state: {:?} -> {:?}", snapshot.state, next);
            snapshot.state = next;
            snapshot.result = Some(result.clone());
            snapshot.updated_at = Utc::now();
        }

        self.publish(next);
        self.event_bus.emit(Event::CompilationFinished { result });
        Ok(next)
    }

    /// Dismiss a finished request and return to Idle
    pub fn dismiss(&self) -> Result<()> {
        {
            let mut snapshot = self.snapshot.write();
            if snapshot.state.is_in_progress() {
                return Err(KEditError::InvalidState(
                    "cannot dismiss a compilation that is still running".into(),
                ));
            }
            *snapshot = CompilationSnapshot::default();
        }
        self.publish(CompilationState::Idle);
        Ok(())
    }

    /// A request that was replaced by a newer one may no longer write
    fn check_owner(snapshot: &CompilationSnapshot, request_id: &str) -> Result<()> {
        if snapshot.request_id.as_deref() == Some(request_id) {
            Ok(())
        } else {
            Err(KEditError::InvalidState(format!(
                "request {} is not the current compilation",
                request_id
            )))
        }
    }

    fn publish(&self, state: CompilationState) {
        self.event_bus.emit(Event::CompilationStateChanged(state));
    }
}

impl Default for CompilationTracker {
    fn default() -> Self {
        Self::new(Arc::new(EventBus::new()))
    }
}
