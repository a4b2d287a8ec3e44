//! Push-channel connection state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one push-channel connection attempt.
///
/// Owned by the gateway client. Everyone else only observes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No channel is open.
    #[default]
    Disconnected,
    /// Channel open, waiting for a challenge (or the grace period).
    Connecting,
    /// Connect request sent, waiting for the server's answer.
    AwaitingHandshake,
    /// Handshake accepted; events are being forwarded.
    Connected,
}

impl ConnectionState {
    /// Stable lowercase name used in status payloads and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHandshake => "awaiting_handshake",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
