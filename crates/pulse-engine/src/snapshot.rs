//! Snapshot assembly from a finished build pass.

use pulse_core::snapshot::{derive_status, sort_trails};
use pulse_core::{TelemetrySnapshot, Trail};

/// Order trails, derive status, and stamp the snapshot.
pub fn assemble(
    mut trails: Vec<Trail>,
    trigger_prompt: Option<String>,
    last_tool: Option<String>,
    active_model: Option<String>,
    now: i64,
) -> TelemetrySnapshot {
    sort_trails(&mut trails);
    TelemetrySnapshot {
        status: derive_status(&trails),
        active_model,
        last_tool,
        trigger_prompt,
        main_headline: None,
        trails,
        generated_at: now,
        message: None,
    }
}
