//! Trail extraction from session log tails.

use pulse_core::constants::MAX_THOUGHTS;
use pulse_core::snapshot::is_inactive;
use pulse_core::{TelemetrySnapshot, Thought, Trail};
use pulse_settings::EngineSettings;
use tracing::debug;

use crate::catalog::SessionRef;
use crate::records::{LogRecord, parse_lines};
use crate::snapshot::assemble;
use crate::tail::read_tail;

/// Build the trail of one session from its last `tail_bytes` of log.
///
/// Returns `None` when the window holds no thoughts.
pub fn build_trail(session: &SessionRef, tail_bytes: u64, now: i64) -> Option<Trail> {
    let records = parse_lines(&read_tail(&session.log_path, tail_bytes));

    let thoughts: Vec<Thought> = records
        .iter()
        .rev()
        .filter_map(|r| match r {
            LogRecord::Thought { text, timestamp } => Some(Thought::new(text.as_str(), *timestamp)),
            _ => None,
        })
        .take(MAX_THOUGHTS)
        .collect();
    if thoughts.is_empty() {
        return None;
    }

    let last_tool = records.iter().rev().find_map(|r| match r {
        LogRecord::ToolCall { name, .. } => Some(name.clone()),
        _ => None,
    });

    Some(Trail {
        id: session.session_id.clone(),
        agent_id: session.agent_id.clone(),
        model: session.model.clone(),
        updated_at: session.updated_at,
        is_subagent: session.role.is_subagent(),
        is_completed: is_inactive(session.updated_at, now),
        thoughts,
        last_tool,
    })
}

/// Find the most recent user message in the last `trigger_bytes` of log.
pub fn find_trigger_prompt(session: &SessionRef, trigger_bytes: u64) -> Option<String> {
    parse_lines(&read_tail(&session.log_path, trigger_bytes))
        .into_iter()
        .rev()
        .find_map(|r| match r {
            LogRecord::UserMessage { text, .. } => Some(text),
            _ => None,
        })
}

/// Per-cycle accumulator of trails and snapshot-level fields.
#[derive(Debug, Default)]
pub struct BuildPass {
    trails: Vec<Trail>,
    trigger_prompt: Option<String>,
    active_model: Option<(i64, String)>,
    last_tool: Option<(i64, String)>,
}

impl BuildPass {
    /// Empty pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no trigger prompt has been recorded yet.
    pub fn needs_trigger_prompt(&self) -> bool {
        self.trigger_prompt.is_none()
    }

    /// Record the trigger prompt. The first write wins; later writes are
    /// ignored and return `false`.
    pub fn set_trigger_prompt(&mut self, prompt: String) -> bool {
        if self.trigger_prompt.is_some() {
            return false;
        }
        self.trigger_prompt = Some(prompt);
        true
    }

    /// Fold one session (and its trail, if any) into the pass.
    pub fn observe(&mut self, session: &SessionRef, trail: Option<Trail>) {
        if !session.model.is_empty() {
            keep_newest(&mut self.active_model, session.updated_at, &session.model);
        }
        if let Some(trail) = trail {
            if let Some(tool) = &trail.last_tool {
                keep_newest(&mut self.last_tool, trail.updated_at, tool);
            }
            self.trails.push(trail);
        }
    }

    /// Finish the pass into a snapshot.
    pub fn into_snapshot(self, now: i64) -> TelemetrySnapshot {
        assemble(
            self.trails,
            self.trigger_prompt,
            self.last_tool.map(|(_, t)| t),
            self.active_model.map(|(_, m)| m),
            now,
        )
    }
}

/// Running maximum by timestamp; ties keep the earlier value.
fn keep_newest(slot: &mut Option<(i64, String)>, at: i64, value: &str) {
    if slot.as_ref().is_none_or(|(seen, _)| at > *seen) {
        *slot = Some((at, value.to_owned()));
    }
}

/// Run a full build pass over `sessions`. Blocking: reads files.
pub fn run_build_pass(sessions: &[SessionRef], engine: &EngineSettings, now: i64) -> TelemetrySnapshot {
    let mut pass = BuildPass::new();
    for session in sessions {
        if session.is_main() && pass.needs_trigger_prompt() {
            if let Some(prompt) = find_trigger_prompt(session, engine.trigger_tail_bytes) {
                debug!(session_id = %session.session_id, "trigger prompt found");
                let _ = pass.set_trigger_prompt(prompt);
            }
        }
        let trail = build_trail(session, engine.max_tail_bytes, now);
        pass.observe(session, trail);
    }
    pass.into_snapshot(now)
}
