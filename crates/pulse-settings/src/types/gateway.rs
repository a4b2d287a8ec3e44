//! Push channel settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Push channel connection and handshake settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Whether to connect at all.
    pub enabled: bool,
    /// WebSocket URL of the gateway.
    pub url: String,
    /// Auth token sent in the connect request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// How long to wait for a challenge before connecting unprompted.
    pub handshake_grace_ms: u64,
    /// Lowest protocol version offered.
    pub min_protocol: u32,
    /// Highest protocol version offered.
    pub max_protocol: u32,
    /// Role requested from the gateway.
    pub role: String,
    /// Scopes requested from the gateway.
    pub scopes: Vec<String>,
    /// Client identifier reported in the connect request.
    pub client_id: String,
    /// First reconnect delay in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Reconnect delay cap in milliseconds.
    pub reconnect_max_delay_ms: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "ws://127.0.0.1:18789".to_string(),
            token: None,
            handshake_grace_ms: 1_500,
            min_protocol: 3,
            max_protocol: 3,
            role: "operator".to_string(),
            scopes: vec!["operator.read".to_string()],
            client_id: "pulse".to_string(),
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
        }
    }
}

impl GatewaySettings {
    /// Grace period before an unprompted connect request.
    pub fn handshake_grace(&self) -> Duration {
        Duration::from_millis(self.handshake_grace_ms)
    }
}
