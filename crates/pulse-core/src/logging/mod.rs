//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`] installs the global stderr subscriber
//! - [`capture_logs`] captures events in memory for test assertions

pub mod test_utils;

pub use test_utils::{CapturedLogs, capture_logs};

/// Initialize the global tracing subscriber with stderr output.
///
/// `RUST_LOG` takes precedence over `level`. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Same as [`init_subscriber`] but emits one JSON object per line.
pub fn init_json_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_does_not_panic() {
        // Multiple calls should be safe (no-op after first)
        init_subscriber("warn");
        init_subscriber("debug");
        init_json_subscriber("info");
    }
}
