//! Push channel wire frames.
//!
//! Outbound there is a single request, `connect`. Inbound frames are decoded
//! into [`InboundFrame`]: the connect challenge, request responses, and push
//! events. Any other JSON object is [`InboundFrame::Other`]; a text frame that
//! is not JSON at all is a decode error.

use pulse_core::constants::{NAME, VERSION};
use pulse_settings::GatewaySettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Event name of the server's connect challenge.
pub const CHALLENGE_EVENT: &str = "connect.challenge";
/// Payload `type` of a successful connect response.
pub const HELLO_OK: &str = "hello-ok";

/// The `connect` request frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectRequest {
    /// Always `req`.
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    /// Request id, echoed by the server in its response.
    pub id: String,
    /// Always `connect`.
    pub method: &'static str,
    /// Connect parameters.
    pub params: ConnectParams,
}

/// Parameters of the `connect` request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Lowest protocol version offered.
    pub min_protocol: u32,
    /// Highest protocol version offered.
    pub max_protocol: u32,
    /// Requested role.
    pub role: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// Credentials.
    pub auth: ConnectAuth,
    /// Client identification.
    pub client: ClientInfo,
    /// Device identification.
    pub device: DeviceInfo,
}

/// Credentials sent with `connect`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectAuth {
    /// Gateway token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Client identification sent with `connect`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientInfo {
    /// Client id.
    pub id: String,
    /// Client display name.
    pub name: &'static str,
    /// Client version.
    pub version: &'static str,
    /// Operating system.
    pub platform: &'static str,
    /// Client mode.
    pub mode: &'static str,
}

/// Device identification sent with `connect`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// Stable id of this process.
    pub id: String,
}

impl ConnectRequest {
    /// Build a connect request with a fresh id.
    pub fn from_settings(settings: &GatewaySettings, device_id: &str) -> Self {
        Self {
            frame_type: "req",
            id: format!("handshake-{}", Uuid::now_v7()),
            method: "connect",
            params: ConnectParams {
                min_protocol: settings.min_protocol,
                max_protocol: settings.max_protocol,
                role: settings.role.clone(),
                scopes: settings.scopes.clone(),
                auth: ConnectAuth {
                    token: settings.token.clone(),
                },
                client: ClientInfo {
                    id: settings.client_id.clone(),
                    name: NAME,
                    version: VERSION,
                    platform: std::env::consts::OS,
                    mode: "backend",
                },
                device: DeviceInfo {
                    id: device_id.to_owned(),
                },
            },
        }
    }
}

/// A decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// The server asks the client to connect.
    Challenge,
    /// Response to a request.
    Response {
        /// Echoed request id, if the server sent one.
        id: Option<String>,
        /// Explicit success flag, if present.
        ok: Option<bool>,
        /// Response payload.
        payload: Value,
        /// Error message, if any.
        error: Option<String>,
    },
    /// A push event.
    Event {
        /// Event name.
        name: String,
        /// Event payload.
        payload: Value,
    },
    /// Anything else.
    Other,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: Option<String>,
    id: Option<Value>,
    ok: Option<bool>,
    event: Option<String>,
    #[serde(default)]
    payload: Value,
    error: Option<Value>,
}

impl InboundFrame {
    /// Whether a response reports handshake success: `ok == true`, or, when
    /// `ok` is absent, a `hello-ok` payload.
    pub fn is_hello_ok(ok: Option<bool>, payload: &Value) -> bool {
        match ok {
            Some(ok) => ok,
            None => payload.get("type").and_then(Value::as_str) == Some(HELLO_OK),
        }
    }
}

/// Decode one text frame.
pub fn decode_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let Ok(raw) = serde_json::from_value::<RawFrame>(value) else {
        return Ok(InboundFrame::Other);
    };

    if raw.event.as_deref() == Some(CHALLENGE_EVENT) {
        return Ok(InboundFrame::Challenge);
    }
    Ok(match raw.frame_type.as_deref() {
        Some("res") => InboundFrame::Response {
            id: raw.id.map(|id| match id {
                Value::String(s) => s,
                other => other.to_string(),
            }),
            ok: raw.ok,
            payload: raw.payload,
            error: raw.error.as_ref().map(error_text),
        },
        Some("event") => match raw.event {
            Some(name) => InboundFrame::Event {
                name,
                payload: raw.payload,
            },
            None => InboundFrame::Other,
        },
        _ => InboundFrame::Other,
    })
}

/// Error text of a response: a string, or an object's `message`.
fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_owned),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    // ── connect request ─────────────────────────────────────────────

    #[test]
    fn connect_request_wire_shape() {
        let settings = GatewaySettings {
            token: Some("secret".into()),
            ..GatewaySettings::default()
        };
        let req = ConnectRequest::from_settings(&settings, "dev-1");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["type"], "req");
        assert_eq!(json["method"], "connect");
        assert!(json["id"].as_str().unwrap().starts_with("handshake-"));
        assert_eq!(json["params"]["minProtocol"], 3);
        assert_eq!(json["params"]["maxProtocol"], 3);
        assert_eq!(json["params"]["role"], "operator");
        assert_eq!(json["params"]["scopes"], json!(["operator.read"]));
        assert_eq!(json["params"]["auth"]["token"], "secret");
        assert_eq!(json["params"]["client"]["id"], "pulse");
        assert_eq!(json["params"]["device"]["id"], "dev-1");
    }

    #[test]
    fn connect_ids_are_unique() {
        let settings = GatewaySettings::default();
        let a = ConnectRequest::from_settings(&settings, "d");
        let b = ConnectRequest::from_settings(&settings, "d");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn missing_token_omitted() {
        let req = ConnectRequest::from_settings(&GatewaySettings::default(), "d");
        let json = serde_json::to_value(&req).unwrap();
        assert!(json["params"]["auth"].get("token").is_none());
    }

    // ── inbound frames ──────────────────────────────────────────────

    #[test]
    fn challenge_with_or_without_type() {
        let frame = decode_frame(r#"{"type":"event","event":"connect.challenge","payload":{"nonce":"n"}}"#);
        assert_eq!(frame.unwrap(), InboundFrame::Challenge);
        assert_eq!(decode_frame(r#"{"event":"connect.challenge"}"#).unwrap(), InboundFrame::Challenge);
    }

    #[test]
    fn response_fields() {
        let frame = decode_frame(r#"{"type":"res","id":"handshake-1","ok":true,"payload":{"type":"hello-ok"}}"#).unwrap();
        assert_matches!(frame, InboundFrame::Response { id: Some(id), ok: Some(true), .. } if id == "handshake-1");
    }

    #[test]
    fn response_error_message_extracted() {
        let frame = decode_frame(r#"{"type":"res","ok":false,"error":{"code":"AUTH","message":"bad token"}}"#).unwrap();
        assert_matches!(frame, InboundFrame::Response { ok: Some(false), error: Some(e), .. } if e == "bad token");
    }

    #[test]
    fn event_frame() {
        let frame = decode_frame(r#"{"type":"event","event":"agent.thought","payload":{"sessionId":"s1"}}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Event {
                name: "agent.thought".into(),
                payload: json!({"sessionId": "s1"}),
            }
        );
    }

    #[test]
    fn other_shapes() {
        assert_eq!(decode_frame(r#"{"type":"ping"}"#).unwrap(), InboundFrame::Other);
        assert_eq!(decode_frame("[1,2,3]").unwrap(), InboundFrame::Other);
        assert_eq!(decode_frame(r#"{"type":"event"}"#).unwrap(), InboundFrame::Other);
    }

    #[test]
    fn non_json_is_error() {
        assert!(decode_frame("hello there").is_err());
    }

    #[test]
    fn hello_ok_rule() {
        assert!(InboundFrame::is_hello_ok(Some(true), &json!({})));
        assert!(!InboundFrame::is_hello_ok(Some(false), &json!({"type": "hello-ok"})));
        assert!(InboundFrame::is_hello_ok(None, &json!({"type": "hello-ok"})));
        assert!(!InboundFrame::is_hello_ok(None, &json!({})));
    }
}
