//! Reconnect backoff: exponential with symmetric jitter.

use std::time::Duration;

use pulse_settings::GatewaySettings;
use rand::Rng;

/// Default jitter factor (±20%).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Delay for zero-based `attempt`, given a `random` value in `[0.0, 1.0)`.
///
/// `min(max_delay, base_delay * 2^attempt) * (1 + (2 * random - 1) * jitter)`
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn backoff_delay(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(max_delay_ms);

    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor;
    let with_jitter = (capped as f64) * jitter;

    with_jitter.round().max(0.0) as u64
}

/// Reconnect delay sequence, reset after a successful handshake.
#[derive(Clone, Debug)]
pub struct Backoff {
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    attempt: u32,
}

impl Backoff {
    /// Backoff starting at `base_delay_ms`, capped at `max_delay_ms`.
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, jitter_factor: f64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            jitter_factor,
            attempt: 0,
        }
    }

    /// Backoff from gateway settings with the default jitter.
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self::new(
            settings.reconnect_base_delay_ms,
            settings.reconnect_max_delay_ms,
            DEFAULT_JITTER_FACTOR,
        )
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Next delay; advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let random: f64 = rand::rng().random();
        let ms = backoff_delay(
            self.attempt,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
            random,
        );
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(ms)
    }

    /// Start over from the base delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
