//! The externally visible telemetry snapshot.
//!
//! A [`TelemetrySnapshot`] is produced wholesale by each poll cycle and
//! patched in place by the real-time reducer. Every producer keeps the same
//! invariants:
//!
//! 1. Trails are sorted: main trails first, then sub-agent trails; inside each
//!    group by descending `updated_at`.
//! 2. A trail holds at most [`MAX_THOUGHTS`] thoughts, most recent first.
//! 3. `status` is `working` iff at least one trail is not completed.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::constants::{COMPLETION_THRESHOLD_MS, MAX_THOUGHTS};

/// Overall activity status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    /// At least one session is still active.
    Working,
    /// Every known session has gone quiet.
    #[default]
    Idle,
    /// The last poll cycle failed at the provider level.
    Error,
}

/// One thought of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thought {
    /// Thought text.
    pub text: String,
    /// When the thought was logged or pushed, epoch milliseconds.
    pub timestamp: i64,
}

impl Thought {
    /// Create a thought.
    pub fn new(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            text: text.into(),
            timestamp,
        }
    }
}

/// Aggregated, capped thought history of one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trail {
    /// Session id.
    pub id: String,
    /// Owning agent id.
    pub agent_id: String,
    /// Model the session runs on.
    pub model: String,
    /// Last activity, epoch milliseconds.
    pub updated_at: i64,
    /// Whether the session belongs to a sub-agent.
    pub is_subagent: bool,
    /// Whether the session has been quiet for longer than the threshold.
    pub is_completed: bool,
    /// Most recent thoughts, newest first.
    pub thoughts: Vec<Thought>,
    /// Most recent tool invoked by this session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tool: Option<String>,
}

impl Trail {
    /// Prepend a thought, dropping the oldest beyond the cap.
    #[must_use]
    pub fn with_thought(mut self, thought: Thought) -> Self {
        self.thoughts.insert(0, thought);
        self.thoughts.truncate(MAX_THOUGHTS);
        self
    }

    /// Thought texts, newest first.
    pub fn thought_texts(&self) -> Vec<&str> {
        self.thoughts.iter().map(|t| t.text.as_str()).collect()
    }
}

/// Whether a session last active at `updated_at` counts as completed at `now`.
pub fn is_inactive(updated_at: i64, now: i64) -> bool {
    now.saturating_sub(updated_at) > COMPLETION_THRESHOLD_MS
}

/// The single externally visible state object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Overall status.
    pub status: SnapshotStatus,
    /// Model of the most recently updated session.
    pub active_model: Option<String>,
    /// Most recent tool invoked across sessions.
    pub last_tool: Option<String>,
    /// The user request that started the main session.
    pub trigger_prompt: Option<String>,
    /// Headline of the main agent's latest pushed content.
    pub main_headline: Option<String>,
    /// Ordered trails (see module docs).
    pub trails: Vec<Trail>,
    /// When this snapshot was produced, epoch milliseconds.
    pub generated_at: i64,
    /// Human-readable reason when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TelemetrySnapshot {
    /// Fail-safe snapshot reported when a poll cycle fails. Carries no trails.
    pub fn error(message: impl Into<String>, now: i64) -> Self {
        Self {
            status: SnapshotStatus::Error,
            generated_at: now,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether this is an error snapshot.
    pub fn is_error(&self) -> bool {
        self.status == SnapshotStatus::Error
    }

    /// Restore the trail ordering invariant.
    pub fn sort_trails(&mut self) {
        sort_trails(&mut self.trails);
    }

    /// Recompute `status` from the trails.
    pub fn refresh_status(&mut self) {
        self.status = derive_status(&self.trails);
    }

    /// Find a trail by session id.
    pub fn trail(&self, session_id: &str) -> Option<&Trail> {
        self.trails.iter().find(|t| t.id == session_id)
    }
}

/// Sort main trails before sub-agent trails, newest first inside each group.
pub fn sort_trails(trails: &mut [Trail]) {
    trails.sort_by_key(|t| (t.is_subagent, Reverse(t.updated_at)));
}

/// `Working` iff any trail is incomplete, otherwise `Idle`.
pub fn derive_status(trails: &[Trail]) -> SnapshotStatus {
    if trails.iter().any(|t| !t.is_completed) {
        SnapshotStatus::Working
    } else {
        SnapshotStatus::Idle
    }
}
