//! Desktop Compiler Bridge
//!
//! Client for the desktop companion process that compiles sources written on
//! the device. The device reaches it on its own loopback through an ADB
//! `reverse` port mapping; every command is one short-lived TCP exchange.

pub mod adb;
pub mod client;
pub mod device;
pub mod poller;
pub mod protocol;
pub mod transport;

pub use adb::{AdbClient, AdbError};
pub use client::{CompilerBridge, SUPPORTED_EXTENSIONS};
pub use device::{Device, DeviceState, DeviceType};
pub use poller::{PollOutcome, StatusPoller};
pub use protocol::{BridgeCommand, CommandOutcome, JobState, StatusLine, ERROR_PREFIX};
pub use transport::{BridgeTransport, TcpTransport};

/// Default bridge port on both ends of the ADB mapping
pub const DEFAULT_BRIDGE_PORT: u16 = 8765;

/// Errors raised while talking to the bridge.
///
/// These never reach the UI directly; the client folds them into
/// `CompilationResult::Error` values.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Timed out {0}")]
    Timeout(&'static str),
    #[error("Bridge closed the connection without answering")]
    EmptyResponse,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
