//! Error types for ciscometer.

use std::time::Duration;

use thiserror::Error;

/// Main error type for ciscometer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command client errors
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Collector unit errors
    #[error("Collector error: {0}")]
    Collector(#[from] CollectorError),
}

/// Transport layer errors (SSH connection, shell channel, command framing).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to establish the connection
    #[error("Connection failed to {host}:{port}: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// The server's host key was rejected by the verification policy
    #[error("Host key for {host}:{port} was rejected")]
    HostKeyRejected { host: String, port: u16 },

    /// The shell stream ended (EOF or channel close)
    #[error("Connection disconnected")]
    Disconnected,

    /// A command did not complete within its deadline
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// The circuit breaker is open; no I/O was attempted
    #[error("Circuit breaker open, retry in {retry_in:?}")]
    CircuitOpen { retry_in: Duration },

    /// The session's executor task is gone
    #[error("Session closed")]
    SessionClosed,
}

impl TransportError {
    /// End-of-stream is expected on normal session teardown.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, TransportError::Disconnected)
    }
}

/// Command client errors (dialect identification, cached execution).
#[derive(Error, Debug)]
pub enum ClientError {
    /// The device OS could not be classified from diagnostic output
    #[error("Unable to identify device OS from '{command}' output")]
    UnknownOs { command: String },

    /// Underlying transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Collector unit errors. Always contained to the failing unit.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Command execution failure
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The unit could not extract facts from command output
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// The metric stream consumer went away
    #[error(transparent)]
    Sink(#[from] SinkClosed),
}

impl CollectorError {
    /// True for the end-of-stream condition seen on normal session
    /// teardown; logged at debug instead of error.
    pub fn is_benign_disconnect(&self) -> bool {
        matches!(
            self,
            CollectorError::Client(ClientError::Transport(TransportError::Disconnected))
        )
    }
}

impl From<TransportError> for CollectorError {
    fn from(err: TransportError) -> Self {
        CollectorError::Client(ClientError::Transport(err))
    }
}

/// The receiving side of the metric stream was dropped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Metric stream closed")]
pub struct SinkClosed;

/// Result type alias using ciscometer's Error.
pub type Result<T> = std::result::Result<T, Error>;
