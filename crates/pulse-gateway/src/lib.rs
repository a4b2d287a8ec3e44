//! # pulse-gateway
//!
//! Push channel client for Pulse.
//!
//! - [`protocol`]: connect request and inbound frame decoding
//! - [`handshake`]: per-attempt challenge/response state machine
//! - [`backoff`]: reconnect delays with jitter
//! - [`client`]: reconnecting WebSocket loop publishing state over `watch`
//!   and events over `mpsc`

#![deny(unsafe_code)]

pub mod backoff;
pub mod client;
pub mod handshake;
pub mod protocol;

pub use backoff::Backoff;
pub use client::{EVENT_CHANNEL_CAPACITY, GatewayClient, wait_for_state};
pub use handshake::{Handshake, HandshakeAction};
pub use protocol::{ConnectRequest, InboundFrame, decode_frame};
