//! Push events delivered by the gateway.
//!
//! The gateway forwards raw `(event_name, payload)` pairs as
//! [`GatewayEvent`]s. The reducer only understands the typed [`PushEvent`]
//! decoded from them; anything else is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of a thought progress event.
pub const EVENT_THOUGHT: &str = "agent.thought";
/// Event name of a tool-call progress event.
pub const EVENT_CALL: &str = "agent.call";
/// Event name of a completion event.
pub const EVENT_RESPONSE: &str = "agent.response";

/// A raw event as forwarded by a connected gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Event name (e.g. `agent.thought`).
    pub name: String,
    /// Event payload, untouched.
    pub payload: Value,
}

impl GatewayEvent {
    /// Create a gateway event.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// What a push event means for its session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushKind {
    /// The agent produced a thought.
    Thought,
    /// The agent invoked a tool.
    Call,
    /// The agent finished responding.
    Response,
}

impl PushKind {
    /// Map an event name to a kind. Unknown names yield `None`.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            EVENT_THOUGHT => Some(Self::Thought),
            EVENT_CALL => Some(Self::Call),
            EVENT_RESPONSE => Some(Self::Response),
            _ => None,
        }
    }

    /// Whether this kind advances a trail (as opposed to completing it).
    pub fn is_progress(self) -> bool {
        matches!(self, Self::Thought | Self::Call)
    }
}

/// Typed push event consumed by the reducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushEvent {
    /// Event kind.
    pub kind: PushKind,
    /// Session the event belongs to.
    pub session_id: String,
    /// Agent owning the session. Empty when the payload omits it.
    pub agent_id: String,
    /// Textual content, if any.
    pub content: Option<String>,
    /// Tool name, if any.
    pub tool: Option<String>,
    /// When the event was received, epoch milliseconds.
    pub received_at: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload {
    session_id: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    tool: Option<String>,
}

impl PushEvent {
    /// Decode a gateway event. Returns `None` for unknown event names and for
    /// payloads without a session id.
    pub fn from_gateway(event: &GatewayEvent, received_at: i64) -> Option<Self> {
        let kind = PushKind::from_event_name(&event.name)?;
        let payload: PushPayload = serde_json::from_value(event.payload.clone()).ok()?;
        let session_id = payload.session_id.filter(|s| !s.is_empty())?;
        Some(Self {
            kind,
            session_id,
            agent_id: payload.agent_id.unwrap_or_default(),
            content: payload.content.as_ref().and_then(content_text),
            tool: payload.tool.filter(|t| !t.is_empty()),
            received_at,
        })
    }

    /// Text to record as a thought: the content, else the tool name.
    pub fn thought_text(&self) -> Option<&str> {
        self.content.as_deref().or(self.tool.as_deref())
    }
}

/// Extract text from a content value: a plain string, or the concatenated
/// `text` fields of an array of parts.
fn content_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
