//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so partial
//! JSON is accepted and missing fields get their production default.

mod engine;
mod gateway;
mod server;

pub use engine::*;
pub use gateway::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for Pulse.
///
/// ```json
/// {
///   "provider": { "command": ["openclaw", "status", "--json"] },
///   "gateway": { "url": "ws://127.0.0.1:18789", "token": "..." }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PulseSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Telemetry provider invocation.
    pub provider: ProviderSettings,
    /// Poll cycle and trail extraction.
    pub engine: EngineSettings,
    /// Push channel.
    pub gateway: GatewaySettings,
    /// Status HTTP server.
    pub server: ServerSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "pulse".to_string(),
            provider: ProviderSettings::default(),
            engine: EngineSettings::default(),
            gateway: GatewaySettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl PulseSettings {
    /// Reject combinations that would make the engine misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.provider.command.first().is_none_or(String::is_empty) {
            return Err(SettingsError::InvalidValue(
                "provider.command must name a program".into(),
            ));
        }
        if self.engine.max_tail_bytes == 0 || self.engine.trigger_tail_bytes == 0 {
            return Err(SettingsError::InvalidValue(
                "engine tail budgets must be positive".into(),
            ));
        }
        if self.engine.poll_interval_ms == 0 || self.engine.cycle_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "engine poll interval and cycle timeout must be positive".into(),
            ));
        }
        if self.gateway.min_protocol > self.gateway.max_protocol {
            return Err(SettingsError::InvalidValue(format!(
                "gateway.minProtocol ({}) exceeds maxProtocol ({})",
                self.gateway.min_protocol, self.gateway.max_protocol
            )));
        }
        if self.gateway.reconnect_base_delay_ms > self.gateway.reconnect_max_delay_ms {
            return Err(SettingsError::InvalidValue(
                "gateway.reconnectBaseDelayMs exceeds reconnectMaxDelayMs".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn partial_json_fills_defaults() {
        let settings: PulseSettings =
            serde_json::from_str(r#"{"gateway": {"token": "abc"}}"#).unwrap();
        assert_eq!(settings.gateway.token.as_deref(), Some("abc"));
        assert_eq!(settings.gateway.max_protocol, 3);
        assert_eq!(settings.engine.poll_interval_ms, 2_000);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(PulseSettings::default()).unwrap();
        assert!(json["engine"]["recencyWindowMs"].is_number());
        assert!(json["gateway"]["handshakeGraceMs"].is_number());
        assert!(json["provider"]["timeoutMs"].is_number());
    }

    #[test]
    fn empty_command_rejected() {
        let mut settings = PulseSettings::default();
        settings.provider.command.clear();
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(_)));
    }

    #[test]
    fn inverted_protocol_bounds_rejected() {
        let mut settings = PulseSettings::default();
        settings.gateway.min_protocol = 4;
        settings.gateway.max_protocol = 3;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("minProtocol (4)"));
    }

    #[test]
    fn zero_tail_budget_rejected() {
        let mut settings = PulseSettings::default();
        settings.engine.max_tail_bytes = 0;
        assert!(settings.validate().is_err());
    }
}
