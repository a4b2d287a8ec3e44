//! # pulse-core
//!
//! Foundation types shared by every Pulse crate.
//!
//! - **Snapshot**: [`TelemetrySnapshot`], [`Trail`], [`SnapshotStatus`], the single
//!   externally visible view of what the agents are doing
//! - **Sessions**: [`SessionRole`] classification of composite session keys
//! - **Push events**: [`GatewayEvent`] as delivered by the push channel and the
//!   typed [`PushEvent`] the reducer consumes
//! - **Connection**: [`ConnectionState`] of the push channel
//! - **Errors**: provider and gateway error hierarchy via `thiserror`
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod connection;
pub mod constants;
pub mod errors;
pub mod events;
pub mod logging;
pub mod session;
pub mod snapshot;

pub use connection::ConnectionState;
pub use errors::{GatewayError, ProviderError};
pub use events::{GatewayEvent, PushEvent, PushKind};
pub use session::SessionRole;
pub use snapshot::{SnapshotStatus, TelemetrySnapshot, Thought, Trail};

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
