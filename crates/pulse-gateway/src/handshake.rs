//! Handshake state machine for one connection attempt.
//!
//! Pure: inputs are channel lifecycle notifications and decoded frames,
//! outputs are [`HandshakeAction`]s for the client loop to perform. The
//! connect request is sent at most once per attempt, whether the challenge
//! or the grace timer comes first.
//!
//! ```text
//! Disconnected ──open──▶ Connecting ──challenge | grace──▶ AwaitingHandshake ──ok──▶ Connected
//!       ▲                                                                          │
//!       └──────────────────────────────── close ──────────────────────────────────┘
//! ```

use pulse_core::{ConnectionState, GatewayEvent};
use tracing::{debug, trace, warn};

use crate::protocol::{ConnectRequest, InboundFrame};

/// Something the client loop must do.
#[derive(Clone, Debug, PartialEq)]
pub enum HandshakeAction {
    /// Send the connect request.
    SendConnect(ConnectRequest),
    /// The handshake succeeded.
    Established,
    /// The server rejected the connect request; close the channel.
    Reject(String),
    /// Forward a push event.
    Forward(GatewayEvent),
}

/// Handshake state of one connection attempt.
#[derive(Debug)]
pub struct Handshake {
    state: ConnectionState,
    request: ConnectRequest,
    connect_sent: bool,
}

impl Handshake {
    /// New attempt that will send `request`.
    pub fn new(request: ConnectRequest) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            request,
            connect_sent: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The channel opened.
    pub fn on_open(&mut self) {
        self.state = ConnectionState::Connecting;
        self.connect_sent = false;
    }

    /// The channel closed or failed.
    pub fn on_close(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// The grace period elapsed without a challenge.
    pub fn on_grace_elapsed(&mut self) -> Option<HandshakeAction> {
        if self.state == ConnectionState::Connecting {
            debug!("no challenge within grace period, connecting unprompted");
        }
        self.send_connect()
    }

    /// An inbound frame arrived.
    pub fn on_frame(&mut self, frame: InboundFrame) -> Option<HandshakeAction> {
        match frame {
            InboundFrame::Challenge => self.send_connect(),
            InboundFrame::Response {
                id,
                ok,
                payload,
                error,
            } => self.on_response(id.as_deref(), ok, &payload, error),
            InboundFrame::Event { name, payload } => {
                if self.state == ConnectionState::Connected {
                    Some(HandshakeAction::Forward(GatewayEvent::new(name, payload)))
                } else {
                    trace!(event = %name, state = %self.state, "dropping event before handshake");
                    None
                }
            }
            InboundFrame::Other => None,
        }
    }

    fn send_connect(&mut self) -> Option<HandshakeAction> {
        if self.state != ConnectionState::Connecting || self.connect_sent {
            return None;
        }
        self.connect_sent = true;
        self.state = ConnectionState::AwaitingHandshake;
        Some(HandshakeAction::SendConnect(self.request.clone()))
    }

    fn on_response(
        &mut self,
        id: Option<&str>,
        ok: Option<bool>,
        payload: &serde_json::Value,
        error: Option<String>,
    ) -> Option<HandshakeAction> {
        if self.state != ConnectionState::AwaitingHandshake {
            return None;
        }
        if id.is_some_and(|id| id != self.request.id) {
            trace!(?id, "ignoring response to another request");
            return None;
        }
        if InboundFrame::is_hello_ok(ok, payload) {
            self.state = ConnectionState::Connected;
            return Some(HandshakeAction::Established);
        }
        if ok == Some(false) {
            let reason = error.unwrap_or_else(|| "connect rejected".to_string());
            warn!(%reason, "gateway rejected handshake");
            return Some(HandshakeAction::Reject(reason));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pulse_settings::GatewaySettings;
    use serde_json::json;

    fn attempt() -> Handshake {
        let mut hs = Handshake::new(ConnectRequest::from_settings(&GatewaySettings::default(), "d"));
        hs.on_open();
        hs
    }

    fn response(id: Option<&str>, ok: Option<bool>, payload: serde_json::Value) -> InboundFrame {
        InboundFrame::Response {
            id: id.map(Into::into),
            ok,
            payload,
            error: None,
        }
    }

    fn event(name: &str) -> InboundFrame {
        InboundFrame::Event {
            name: name.into(),
            payload: json!({"sessionId": "s1"}),
        }
    }

    fn connected() -> Handshake {
        let mut hs = attempt();
        let _ = hs.on_frame(InboundFrame::Challenge);
        let _ = hs.on_frame(response(None, Some(true), json!({})));
        hs
    }

    // ── connect request ─────────────────────────────────────────────

    #[test]
    fn starts_disconnected_then_connecting() {
        let mut hs = Handshake::new(ConnectRequest::from_settings(&GatewaySettings::default(), "d"));
        assert_eq!(hs.state(), ConnectionState::Disconnected);
        assert!(hs.on_grace_elapsed().is_none());
        hs.on_open();
        assert_eq!(hs.state(), ConnectionState::Connecting);
    }

    #[test]
    fn challenge_sends_connect() {
        let mut hs = attempt();
        assert_matches!(hs.on_frame(InboundFrame::Challenge), Some(HandshakeAction::SendConnect(_)));
        assert_eq!(hs.state(), ConnectionState::AwaitingHandshake);
    }

    #[test]
    fn grace_sends_connect_without_challenge() {
        let mut hs = attempt();
        assert_matches!(hs.on_grace_elapsed(), Some(HandshakeAction::SendConnect(_)));
        assert_eq!(hs.state(), ConnectionState::AwaitingHandshake);
    }

    #[test]
    fn challenge_and_grace_send_exactly_once() {
        let mut hs = attempt();
        let sent = [
            hs.on_frame(InboundFrame::Challenge),
            hs.on_grace_elapsed(),
            hs.on_frame(InboundFrame::Challenge),
        ]
        .into_iter()
        .filter(|a| matches!(a, Some(HandshakeAction::SendConnect(_))))
        .count();
        assert_eq!(sent, 1);

        let mut hs = attempt();
        let sent = [hs.on_grace_elapsed(), hs.on_frame(InboundFrame::Challenge)]
            .into_iter()
            .filter(|a| matches!(a, Some(HandshakeAction::SendConnect(_))))
            .count();
        assert_eq!(sent, 1);
    }

    #[test]
    fn reopen_allows_a_new_connect() {
        let mut hs = attempt();
        let _ = hs.on_grace_elapsed();
        hs.on_close();
        hs.on_open();
        assert_matches!(hs.on_frame(InboundFrame::Challenge), Some(HandshakeAction::SendConnect(_)));
    }

    // ── responses ───────────────────────────────────────────────────

    #[test]
    fn hello_ok_without_ok_flag_connects() {
        let mut hs = attempt();
        let _ = hs.on_grace_elapsed();
        let action = hs.on_frame(response(None, None, json!({"type": "hello-ok"})));
        assert_eq!(action, Some(HandshakeAction::Established));
        assert_eq!(hs.state(), ConnectionState::Connected);
    }

    #[test]
    fn matching_id_required_when_echoed() {
        let mut hs = attempt();
        let Some(HandshakeAction::SendConnect(req)) = hs.on_grace_elapsed() else {
            panic!("expected connect");
        };
        assert!(hs.on_frame(response(Some("other"), Some(true), json!({}))).is_none());
        assert_eq!(hs.state(), ConnectionState::AwaitingHandshake);
        assert_eq!(
            hs.on_frame(response(Some(&req.id), Some(true), json!({}))),
            Some(HandshakeAction::Established)
        );
    }

    #[test]
    fn response_before_connect_ignored() {
        let mut hs = attempt();
        assert!(hs.on_frame(response(None, Some(true), json!({}))).is_none());
        assert_eq!(hs.state(), ConnectionState::Connecting);
    }

    #[test]
    fn rejection_never_connects() {
        let mut hs = attempt();
        let _ = hs.on_frame(InboundFrame::Challenge);
        let action = hs.on_frame(InboundFrame::Response {
            id: None,
            ok: Some(false),
            payload: json!({"type": "hello-ok"}),
            error: Some("bad token".into()),
        });
        assert_eq!(action, Some(HandshakeAction::Reject("bad token".into())));
        assert_eq!(hs.state(), ConnectionState::AwaitingHandshake);
        assert!(hs.on_frame(event("agent.thought")).is_none());
    }

    #[test]
    fn unrelated_response_ignored() {
        let mut hs = attempt();
        let _ = hs.on_grace_elapsed();
        assert!(hs.on_frame(response(None, None, json!({"type": "pong"}))).is_none());
        assert_eq!(hs.state(), ConnectionState::AwaitingHandshake);
    }

    // ── events ──────────────────────────────────────────────────────

    #[test]
    fn events_before_connected_dropped() {
        let mut hs = attempt();
        assert!(hs.on_frame(event("agent.thought")).is_none());
        let _ = hs.on_grace_elapsed();
        assert!(hs.on_frame(event("agent.thought")).is_none());
    }

    #[test]
    fn events_forwarded_once_connected() {
        let mut hs = connected();
        assert_eq!(
            hs.on_frame(event("agent.call")),
            Some(HandshakeAction::Forward(GatewayEvent::new(
                "agent.call",
                json!({"sessionId": "s1"})
            )))
        );
    }

    #[test]
    fn challenge_after_connected_consumed() {
        let mut hs = connected();
        assert!(hs.on_frame(InboundFrame::Challenge).is_none());
        assert_eq!(hs.state(), ConnectionState::Connected);
    }

    #[test]
    fn close_disconnects() {
        let mut hs = connected();
        hs.on_close();
        assert_eq!(hs.state(), ConnectionState::Disconnected);
        assert!(hs.on_frame(event("agent.thought")).is_none());
    }
}
