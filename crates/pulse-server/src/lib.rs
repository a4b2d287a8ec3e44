//! # pulse-server
//!
//! Axum HTTP surface over the [`pulse_engine::SnapshotStore`].
//!
//! - `GET /api/status`: the current snapshot plus push-channel state
//! - `GET /health`: liveness, uptime, and snapshot version
//! - Graceful shutdown via [`ShutdownCoordinator`] (`CancellationToken`)

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod status;

pub use errors::ServerError;
pub use server::{AppState, PulseServer};
pub use shutdown::ShutdownCoordinator;
