//! Session catalog: which sessions are live and where their logs are.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::PathBuf;

use pulse_core::SessionRole;
use tracing::debug;

use crate::provider::ProviderSnapshot;

/// Log file extension of a session.
const LOG_EXTENSION: &str = "jsonl";

/// An agent known to the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentDescriptor {
    /// Agent id.
    pub id: String,
    /// Directory holding `<session_id>.jsonl` files.
    pub log_directory: PathBuf,
}

/// A live session resolved to its log file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRef {
    /// Session id.
    pub session_id: String,
    /// Owning agent id.
    pub agent_id: String,
    /// Composite session key.
    pub session_key: String,
    /// Model the session runs on.
    pub model: String,
    /// Last activity, epoch milliseconds.
    pub updated_at: i64,
    /// Main or sub-agent.
    pub role: SessionRole,
    /// Resolved log file.
    pub log_path: PathBuf,
}

impl SessionRef {
    /// Whether this is a main (non-subagent) session.
    pub fn is_main(&self) -> bool {
        self.role == SessionRole::Main
    }
}

/// Select sessions updated within `recency_window_ms` of `now` whose log
/// file exists, newest first.
pub fn select_live_sessions(
    snapshot: &ProviderSnapshot,
    agents: &HashMap<String, AgentDescriptor>,
    now: i64,
    recency_window_ms: u64,
) -> Vec<SessionRef> {
    let window = i64::try_from(recency_window_ms).unwrap_or(i64::MAX);
    let mut live: Vec<SessionRef> = snapshot
        .sessions
        .recent
        .iter()
        .filter(|s| !s.session_id.is_empty())
        .filter(|s| now.saturating_sub(s.updated_at) <= window)
        .filter_map(|s| {
            let Some(agent) = agents.get(&s.agent_id) else {
                debug!(session_id = %s.session_id, agent_id = %s.agent_id, "unknown agent, skipping session");
                return None;
            };
            let log_path = agent
                .log_directory
                .join(format!("{}.{LOG_EXTENSION}", s.session_id));
            if !log_path.is_file() {
                debug!(session_id = %s.session_id, path = ?log_path, "session log missing, skipping");
                return None;
            }
            Some(SessionRef {
                session_id: s.session_id.clone(),
                agent_id: s.agent_id.clone(),
                session_key: s.key.clone(),
                model: s.model.clone(),
                updated_at: s.updated_at,
                role: SessionRole::from_key(&s.key),
                log_path,
            })
        })
        .collect();
    live.sort_by_key(|s| Reverse(s.updated_at));
    live
}
