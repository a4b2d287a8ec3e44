//! `/health` endpoint.

use std::time::Instant;

use pulse_core::ConnectionState;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Push-channel state.
    pub connection: ConnectionState,
    /// Snapshot store version.
    pub snapshot_version: u64,
}

/// Build a health response from live state.
pub fn health_check(
    start_time: Instant,
    connection: ConnectionState,
    snapshot_version: u64,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connection,
        snapshot_version,
    }
}
