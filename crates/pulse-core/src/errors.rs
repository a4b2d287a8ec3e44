//! Error hierarchy for Pulse.
//!
//! Only provider failures surface to the operator (as an error snapshot).
//! Gateway failures end a connection attempt and are retried by the client
//! loop; file, line, and session problems are skipped where they occur and
//! never become errors at all.

use std::time::Duration;

use thiserror::Error;

/// Failure of one telemetry provider invocation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider command could not be started.
    #[error("failed to spawn provider `{program}`: {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The provider exited unsuccessfully.
    #[error("provider exited with {status}: {stderr}")]
    Exit {
        /// Exit status description.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },
    /// The provider output was not a telemetry document.
    #[error("invalid provider output: {0}")]
    Decode(#[from] serde_json::Error),
    /// The provider (or the whole poll cycle) exceeded its deadline.
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
    /// The poll cycle failed for a reason outside the provider itself.
    #[error("poll cycle failed: {0}")]
    Cycle(String),
}

impl ProviderError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn_failed",
            Self::Exit { .. } => "exit_status",
            Self::Decode(_) => "decode",
            Self::Timeout(_) => "timeout",
            Self::Cycle(_) => "cycle",
        }
    }
}

/// Failure of one push-channel connection attempt.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The channel could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The channel failed while open.
    #[error("transport error: {0}")]
    Transport(String),
    /// A frame could not be decoded as JSON.
    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),
    /// The server rejected the connect request.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),
    /// The channel closed.
    #[error("channel closed")]
    Closed,
}

impl GatewayError {
    /// Whether a new connection attempt may succeed. Every gateway failure is
    /// retryable except an explicit rejection, which needs new credentials.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::HandshakeRejected(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::HandshakeRejected(_) => "handshake_rejected",
            Self::Closed => "closed",
        }
    }
}
