//! Real-time reducer: patches the snapshot from push events.
//!
//! Trail updates are pure `(Trail, &PushEvent) -> Trail` functions; [`apply`]
//! finds the trail, swaps in the updated one, and restores the snapshot
//! invariants. Nothing here touches the filesystem.

use pulse_core::constants::HEADLINE_PREFIX_CHARS;
use pulse_core::{PushEvent, PushKind, SessionRole, SnapshotStatus, TelemetrySnapshot, Thought, Trail};
use tracing::trace;

/// Apply one push event. Returns whether the snapshot changed.
pub fn apply(snapshot: &mut TelemetrySnapshot, event: &PushEvent, main_agent_id: &str) -> bool {
    let changed = if event.kind.is_progress() {
        apply_progress(snapshot, event, main_agent_id)
    } else {
        apply_completion(snapshot, event)
    };
    if changed {
        snapshot.sort_trails();
    }
    changed
}

fn apply_progress(snapshot: &mut TelemetrySnapshot, event: &PushEvent, main_agent_id: &str) -> bool {
    if event.thought_text().is_none() {
        trace!(session_id = %event.session_id, "progress event without content or tool");
        return false;
    }

    let position = snapshot.trails.iter().position(|t| t.id == event.session_id);
    let trail = match position {
        Some(i) => snapshot.trails.swap_remove(i),
        None => new_trail(event, main_agent_id),
    };
    snapshot.trails.push(advance_trail(trail, event));

    if let Some(tool) = &event.tool {
        snapshot.last_tool = Some(tool.clone());
    }
    if SessionRole::from_agent(&event.agent_id, main_agent_id) == SessionRole::Main {
        if let Some(headline) = event.content.as_deref().and_then(headline) {
            snapshot.main_headline = Some(headline);
        }
    }
    snapshot.status = SnapshotStatus::Working;
    snapshot.message = None;
    true
}

fn apply_completion(snapshot: &mut TelemetrySnapshot, event: &PushEvent) -> bool {
    let Some(i) = snapshot.trails.iter().position(|t| t.id == event.session_id) else {
        return false;
    };
    let trail = snapshot.trails.swap_remove(i);
    snapshot.trails.push(complete_trail(trail));
    snapshot.refresh_status();
    true
}

/// Trail for a session first seen through a push event. Push events carry
/// no model; it stays empty until the next poll reports the session.
fn new_trail(event: &PushEvent, main_agent_id: &str) -> Trail {
    Trail {
        id: event.session_id.clone(),
        agent_id: event.agent_id.clone(),
        model: String::new(),
        updated_at: event.received_at,
        is_subagent: SessionRole::from_agent(&event.agent_id, main_agent_id).is_subagent(),
        is_completed: false,
        thoughts: Vec::new(),
        last_tool: None,
    }
}

/// Record a progress event on a trail.
pub fn advance_trail(trail: Trail, event: &PushEvent) -> Trail {
    let mut trail = match event.thought_text() {
        Some(text) => trail.with_thought(Thought::new(text, event.received_at)),
        None => trail,
    };
    trail.updated_at = trail.updated_at.max(event.received_at);
    trail.is_completed = false;
    if let Some(tool) = &event.tool {
        trail.last_tool = Some(tool.clone());
    }
    trail
}

/// Mark a trail completed.
pub fn complete_trail(mut trail: Trail) -> Trail {
    trail.is_completed = true;
    trail
}

/// First `**bold**` or `#` heading line of `content`, else its first
/// [`HEADLINE_PREFIX_CHARS`] characters.
pub fn headline(content: &str) -> Option<String> {
    let marked = content.lines().map(str::trim).find_map(|line| {
        if let Some(rest) = line.strip_prefix('#') {
            let text = rest.trim_start_matches('#').trim();
            return (!text.is_empty()).then_some(text);
        }
        let start = line.find("**")?;
        let rest = &line[start + 2..];
        let end = rest.find("**")?;
        let text = rest[..end].trim();
        (!text.is_empty()).then_some(text)
    });
    if let Some(text) = marked {
        return Some(text.to_owned());
    }
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return None;
    }
    Some(flat.chars().take(HEADLINE_PREFIX_CHARS).collect())
}
