//! Session hierarchy classification.

use serde::{Deserialize, Serialize};

use crate::constants::SUBAGENT_KEY_SEGMENT;

/// Position of a session in the agent hierarchy.
///
/// Classified once, at ingestion, from the composite session key
/// (e.g. `agent:main:main` vs `agent:main:subagent:7f3c`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    /// The orchestrator's own session.
    Main,
    /// A session spawned on behalf of another session.
    Subagent,
}

impl SessionRole {
    /// Classify a session key.
    pub fn from_key(key: &str) -> Self {
        if key.contains(SUBAGENT_KEY_SEGMENT) {
            Self::Subagent
        } else {
            Self::Main
        }
    }

    /// Classify by owning agent, used when only an agent id is known
    /// (push events carry no session key).
    pub fn from_agent(agent_id: &str, main_agent_id: &str) -> Self {
        if agent_id == main_agent_id {
            Self::Main
        } else {
            Self::Subagent
        }
    }

    /// Whether this is a sub-agent session.
    pub fn is_subagent(self) -> bool {
        self == Self::Subagent
    }
}
