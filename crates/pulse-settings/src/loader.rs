//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PulseSettings::default()`]
//! 2. If `~/.pulse/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `PULSE_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::PulseSettings;

/// Resolve the path to the settings file (`~/.pulse/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pulse").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PulseSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a combination rejected
/// by [`PulseSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PulseSettings> {
    let defaults = serde_json::to_value(PulseSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: PulseSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut PulseSettings) {
    // ── Provider ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PULSE_PROVIDER_COMMAND").and_then(|v| parse_command(&v)) {
        settings.provider.command = v;
    }
    if let Some(v) = read_env_u64("PULSE_PROVIDER_TIMEOUT_MS", 100, 600_000) {
        settings.provider.timeout_ms = v;
    }

    // ── Engine ──────────────────────────────────────────────────────
    if let Some(v) = read_env_u64("PULSE_POLL_INTERVAL_MS", 100, 3_600_000) {
        settings.engine.poll_interval_ms = v;
    }
    if let Some(v) = read_env_u64("PULSE_RECENCY_WINDOW_MS", 1_000, 86_400_000) {
        settings.engine.recency_window_ms = v;
    }
    if let Some(v) = read_env_string("PULSE_MAIN_AGENT") {
        settings.engine.main_agent_id = v;
    }

    // ── Gateway ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PULSE_GATEWAY_URL") {
        settings.gateway.url = v;
    }
    if let Some(v) = read_env_string("PULSE_GATEWAY_TOKEN") {
        settings.gateway.token = Some(v);
    }
    if let Some(v) = read_env_bool("PULSE_GATEWAY_ENABLED") {
        settings.gateway.enabled = v;
    }

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PULSE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("PULSE_PORT", 0, 65535) {
        settings.server.port = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PULSE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("PULSE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a command line on whitespace. `None` when nothing is left.
pub fn parse_command(val: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = val.split_whitespace().map(str::to_string).collect();
    (!parts.is_empty()).then_some(parts)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
