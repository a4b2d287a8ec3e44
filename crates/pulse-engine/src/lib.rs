//! # pulse-engine
//!
//! Telemetry reconciliation for Pulse.
//!
//! The poll path discovers live sessions from the provider, reads a bounded
//! tail of each session log, and assembles a fresh [`TelemetrySnapshot`].
//! The push path patches that snapshot from gateway events. Both write
//! through the [`SnapshotStore`].
//!
//! - [`tail`]: bounded reads from the end of a log file
//! - [`records`]: log line → [`records::LogRecord`]
//! - [`catalog`]: provider document → live [`catalog::SessionRef`]s
//! - [`trail`]: session log → [`pulse_core::Trail`], plus the per-cycle [`trail::BuildPass`]
//! - [`snapshot`]: trails → ordered snapshot
//! - [`reducer`]: push event → snapshot patch
//! - [`provider`]: the external telemetry command
//! - [`store`]: versioned snapshot holder with poll/push reconciliation
//! - [`poller`]: single-in-flight poll loop
//!
//! [`TelemetrySnapshot`]: pulse_core::TelemetrySnapshot

#![deny(unsafe_code)]

pub mod catalog;
pub mod poller;
pub mod provider;
pub mod records;
pub mod reducer;
pub mod snapshot;
pub mod store;
pub mod tail;
pub mod trail;

pub use catalog::{AgentDescriptor, SessionRef, select_live_sessions};
pub use poller::{PollOutcome, Poller};
pub use provider::{CommandProvider, ProviderSnapshot, TelemetryProvider};
pub use store::{SnapshotStore, run_event_sink};
