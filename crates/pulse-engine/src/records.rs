//! Typed records parsed from session log lines.
//!
//! Each line of a session log is one JSON object. Only a few shapes matter
//! for the trail: explicit thoughts, assistant thinking parts, tool calls,
//! and user messages. Everything else well-formed is [`LogRecord::Other`];
//! lines that are not JSON objects are [`LogRecord::Unparsable`] and dropped
//! by [`parse_lines`].

use pulse_core::now_ms;
use serde_json::Value;

/// Content part types that denote a tool invocation.
const TOOL_CALL_PART_TYPES: &[&str] = &["toolCall", "tool_use", "toolUse", "call"];

/// One parsed log line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogRecord {
    /// A reasoning step.
    Thought {
        /// Thought text.
        text: String,
        /// Epoch milliseconds.
        timestamp: i64,
    },
    /// A tool invocation.
    ToolCall {
        /// Tool name.
        name: String,
        /// Epoch milliseconds.
        timestamp: i64,
    },
    /// A message typed by the user.
    UserMessage {
        /// Message text.
        text: String,
        /// Epoch milliseconds.
        timestamp: i64,
    },
    /// Well-formed, but of no interest.
    Other,
    /// Not a JSON object.
    Unparsable,
}

/// Parse every line of `text`, dropping blank and unparsable lines.
pub fn parse_lines(text: &str) -> Vec<LogRecord> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .filter(|record| *record != LogRecord::Unparsable)
        .collect()
}

/// Parse one log line.
pub fn parse_line(line: &str) -> LogRecord {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(line.trim()) else {
        return LogRecord::Unparsable;
    };
    let value = Value::Object(obj);
    let timestamp = record_timestamp(&value);

    if str_field(&value, "type") == Some("thought") {
        if let Some(text) = value.get("content").and_then(text_of) {
            return LogRecord::Thought { text, timestamp };
        }
    }

    let message = message_of(&value);
    let role = message.and_then(|m| str_field(m, "role"));
    let parts = message.and_then(|m| m.get("content")).and_then(Value::as_array);

    if role == Some("assistant") {
        if let Some(text) = parts.and_then(|p| thinking_text(p)) {
            return LogRecord::Thought { text, timestamp };
        }
    }

    if str_field(&value, "type") == Some("call") {
        if let Some(name) = tool_name(&value) {
            return LogRecord::ToolCall { name, timestamp };
        }
    }
    if role == Some("assistant") {
        if let Some(name) = parts.and_then(|p| tool_call_name(p)) {
            return LogRecord::ToolCall { name, timestamp };
        }
    }

    if role == Some("user") {
        if let Some(text) = message.and_then(|m| m.get("content")).and_then(text_of) {
            return LogRecord::UserMessage { text, timestamp };
        }
    }

    LogRecord::Other
}

/// The message object of a line: nested under `message`, or the line itself.
fn message_of(value: &Value) -> Option<&Value> {
    match value.get("message") {
        Some(inner @ Value::Object(_)) => Some(inner),
        _ if value.get("role").is_some() => Some(value),
        _ => None,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn tool_name(value: &Value) -> Option<String> {
    str_field(value, "tool")
        .or_else(|| str_field(value, "name"))
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn thinking_text(parts: &[Value]) -> Option<String> {
    parts
        .iter()
        .filter(|p| str_field(p, "type") == Some("thinking"))
        .find_map(|p| {
            str_field(p, "thinking")
                .or_else(|| str_field(p, "text"))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        })
}

fn tool_call_name(parts: &[Value]) -> Option<String> {
    parts
        .iter()
        .filter(|p| str_field(p, "type").is_some_and(|t| TOOL_CALL_PART_TYPES.contains(&t)))
        .find_map(tool_name)
}

/// Text of a content value: a string, or the `text` parts of an array.
fn text_of(content: &Value) -> Option<String> {
    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter(|p| str_field(p, "type").is_none_or(|t| t == "text"))
            .filter_map(|p| str_field(p, "text"))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Explicit `timestamp` (epoch ms or RFC 3339), else now.
fn record_timestamp(value: &Value) -> i64 {
    match value.get("timestamp") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_else(now_ms),
        Some(Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|_| now_ms()),
        _ => now_ms(),
    }
}
