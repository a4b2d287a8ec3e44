//! # pulse-settings
//!
//! Configuration with layered sources for Pulse.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`PulseSettings::default()`]
//! 2. **User file**: `~/.pulse/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PULSE_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<PulseSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// Loads `~/.pulse/settings.json` with env overrides on first call and
/// falls back to compiled defaults if loading fails.
pub fn get_settings() -> &'static PulseSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: PulseSettings) -> std::result::Result<(), PulseSettings> {
    SETTINGS.set(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = PulseSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.name, "pulse");
        assert_eq!(settings.provider.timeout_ms, 5_000);
        assert_eq!(settings.engine.max_tail_bytes, 20 * 1024);
        assert_eq!(settings.engine.main_agent_id, "main");
        assert_eq!(settings.gateway.min_protocol, 3);
        assert_eq!(settings.gateway.role, "operator");
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn global_settings_initialize_once() {
        let first = get_settings();
        assert!(init_settings(PulseSettings::default()).is_err());
        assert_eq!(get_settings().name, first.name);
    }
}
