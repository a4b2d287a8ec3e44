//! Package-level constants.

/// Current version of Pulse (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "pulse";

/// Maximum number of thoughts kept per trail. Older thoughts are dropped.
pub const MAX_THOUGHTS: usize = 15;

/// Inactivity threshold after which a session counts as completed.
///
/// A trail is completed when `now - updated_at` exceeds this many
/// milliseconds. Both the polling path and the reducer path use it.
pub const COMPLETION_THRESHOLD_MS: i64 = 45_000;

/// Agent id of the orchestrator. Sessions of any other agent are sub-agents.
pub const MAIN_AGENT_ID: &str = "main";

/// Key segment marking a session as spawned by another session.
pub const SUBAGENT_KEY_SEGMENT: &str = ":subagent:";

/// Length of the fallback headline prefix when no marked line exists.
pub const HEADLINE_PREFIX_CHARS: usize = 80;
