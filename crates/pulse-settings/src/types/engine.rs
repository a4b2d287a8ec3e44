//! Provider and poll-cycle settings.

use std::time::Duration;

use pulse_core::constants::MAIN_AGENT_ID;
use serde::{Deserialize, Serialize};

/// How the telemetry provider is invoked.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Hard deadline for one invocation in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            command: vec!["openclaw".into(), "status".into(), "--json".into()],
            timeout_ms: 5_000,
        }
    }
}

impl ProviderSettings {
    /// Invocation deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Poll cycle and trail extraction settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Delay between poll cycles in milliseconds.
    pub poll_interval_ms: u64,
    /// Deadline for a whole poll cycle (provider + file reads).
    pub cycle_timeout_ms: u64,
    /// Sessions updated longer ago than this are not shown.
    pub recency_window_ms: u64,
    /// Tail window read per session for thoughts and tool calls.
    pub max_tail_bytes: u64,
    /// Larger window scanned once per cycle for the trigger prompt.
    pub trigger_tail_bytes: u64,
    /// Agent id of the orchestrator.
    pub main_agent_id: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            cycle_timeout_ms: 8_000,
            recency_window_ms: 300_000,
            max_tail_bytes: 20 * 1024,
            trigger_tail_bytes: 512 * 1024,
            main_agent_id: MAIN_AGENT_ID.to_string(),
        }
    }
}

impl EngineSettings {
    /// Delay between poll cycles.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Deadline for a whole poll cycle.
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_millis(self.cycle_timeout_ms)
    }
}
