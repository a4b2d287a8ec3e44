//! `/api/status` response body.

use pulse_core::{ConnectionState, TelemetrySnapshot};
use serde::Serialize;

/// The snapshot fields at top level, plus the push-channel state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Current snapshot.
    #[serde(flatten)]
    pub snapshot: TelemetrySnapshot,
    /// Push-channel state.
    pub connection: ConnectionState,
}
