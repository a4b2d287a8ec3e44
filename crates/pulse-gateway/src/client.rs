//! Reconnecting gateway client.
//!
//! Each attempt opens a WebSocket, drives a [`Handshake`], and forwards push
//! events over an `mpsc` channel until the channel closes. Between attempts
//! the client sleeps on a [`Backoff`], which resets after every successful
//! handshake. Connection state is published on a `watch` channel.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pulse_core::{ConnectionState, GatewayError, GatewayEvent};
use pulse_settings::GatewaySettings;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backoff::Backoff;
use crate::handshake::{Handshake, HandshakeAction};
use crate::protocol::{ConnectRequest, decode_frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;

/// Capacity of the event channel from the client to the reducer.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Reconnecting push-channel client.
pub struct GatewayClient {
    settings: GatewaySettings,
    device_id: String,
    events: mpsc::Sender<GatewayEvent>,
    state: watch::Sender<ConnectionState>,
}

impl GatewayClient {
    /// Create a client forwarding events to `events`. Returns the client and
    /// a receiver observing its connection state.
    pub fn new(
        settings: GatewaySettings,
        events: mpsc::Sender<GatewayEvent>,
    ) -> (Self, watch::Receiver<ConnectionState>) {
        let (state, state_rx) = watch::channel(ConnectionState::Disconnected);
        let client = Self {
            settings,
            device_id: Uuid::now_v7().to_string(),
            events,
            state,
        };
        (client, state_rx)
    }

    /// Another observer of the connection state.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connect, and reconnect after failures, until `cancel` fires or the
    /// server rejects the handshake.
    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = Backoff::from_settings(&self.settings);
        info!(url = %self.settings.url, "gateway client started");

        loop {
            match self.attempt(&cancel, &mut backoff).await {
                Ok(()) => break,
                Err(e) if !e.is_retryable() => {
                    error!(error = %e, "gateway handshake rejected, not reconnecting");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, kind = e.error_kind(), "gateway connection ended");
                }
            }
            self.publish(ConnectionState::Disconnected);

            let delay = backoff.next_delay();
            debug!(?delay, "reconnecting");
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.publish(ConnectionState::Disconnected);
        info!("gateway client stopped");
    }

    /// One connection attempt. `Ok` means it was cancelled.
    async fn attempt(
        &self,
        cancel: &CancellationToken,
        backoff: &mut Backoff,
    ) -> Result<(), GatewayError> {
        let connect = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            result = connect_async(self.settings.url.as_str()) => result,
        };
        let (ws, _) = connect.map_err(|e| GatewayError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let request = ConnectRequest::from_settings(&self.settings, &self.device_id);
        let mut handshake = Handshake::new(request);
        handshake.on_open();
        self.publish(handshake.state());

        let grace = tokio::time::sleep(self.settings.handshake_grace());
        tokio::pin!(grace);
        let mut grace_done = false;

        let result = loop {
            let action = tokio::select! {
                () = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break Ok(());
                }
                () = &mut grace, if !grace_done => {
                    grace_done = true;
                    handshake.on_grace_elapsed()
                }
                frame = stream.next() => {
                    match frame {
                        None | Some(Ok(Message::Close(_))) => break Err(GatewayError::Closed),
                        Some(Err(e)) => break Err(GatewayError::Transport(e.to_string())),
                        Some(Ok(Message::Text(text))) => match decode_frame(text.as_str()) {
                            Ok(frame) => handshake.on_frame(frame),
                            Err(e) => {
                                warn!(error = %e, "undecodable gateway frame, closing");
                                break Err(GatewayError::Decode(e));
                            }
                        },
                        Some(Ok(_)) => None,
                    }
                }
            };

            let Some(action) = action else { continue };
            if let Err(e) = self.perform(action, &mut sink, &handshake, backoff).await {
                let _ = sink.send(Message::Close(None)).await;
                break Err(e);
            }
        };

        handshake.on_close();
        result
    }

    async fn perform(
        &self,
        action: HandshakeAction,
        sink: &mut WsSink,
        handshake: &Handshake,
        backoff: &mut Backoff,
    ) -> Result<(), GatewayError> {
        match action {
            HandshakeAction::SendConnect(request) => {
                let text = serde_json::to_string(&request)?;
                sink.send(Message::Text(text.into()))
                    .await
                    .map_err(|e| GatewayError::Transport(e.to_string()))?;
                debug!(id = %request.id, "connect request sent");
                self.publish(handshake.state());
            }
            HandshakeAction::Established => {
                info!(url = %self.settings.url, "gateway connected");
                backoff.reset();
                self.publish(handshake.state());
            }
            HandshakeAction::Reject(reason) => {
                return Err(GatewayError::HandshakeRejected(reason));
            }
            HandshakeAction::Forward(event) => {
                self.events
                    .send(event)
                    .await
                    .map_err(|_| GatewayError::Closed)?;
            }
        }
        Ok(())
    }

    fn publish(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(%state, "gateway state changed");
        }
    }
}

/// Wait until `rx` reports `wanted`, up to `timeout`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    wanted: ConnectionState,
    timeout: Duration,
) -> bool {
    tokio::time::timeout(timeout, rx.wait_for(|s| *s == wanted))
        .await
        .is_ok_and(|r| r.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_starts_disconnected() {
        let (tx, _rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (client, state) = GatewayClient::new(GatewaySettings::default(), tx);
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
        assert_eq!(*client.subscribe().borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn unreachable_gateway_keeps_retrying_until_cancelled() {
        let (tx, _rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let settings = GatewaySettings {
            url: "ws://127.0.0.1:1".into(),
            reconnect_base_delay_ms: 5,
            reconnect_max_delay_ms: 20,
            ..GatewaySettings::default()
        };
        let (client, state) = GatewayClient::new(settings, tx);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(client.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!task.is_finished());
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn wait_for_state_times_out() {
        let (_tx, mut rx) = watch::channel(ConnectionState::Disconnected);
        assert!(!wait_for_state(&mut rx, ConnectionState::Connected, Duration::from_millis(20)).await);
        assert!(wait_for_state(&mut rx, ConnectionState::Disconnected, Duration::from_millis(20)).await);
    }
}
