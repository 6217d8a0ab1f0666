//! Push-event channel
//!
//! Persistent WebSocket connection to the pairing backend. On connect the
//! client sends a `register` frame carrying the owner identifier; the server
//! then pushes owner-scoped events (pairing artifact, connection
//! confirmations) plus a global status-changed event that is filtered by
//! owner id on this side. Frames are decoded once into [`ChannelEvent`] and
//! delivered in arrival order.
//!
//! The channel is an explicitly owned resource: the pairing flow creates it,
//! tears it down, and `reconnect` replaces the registration wholesale. A
//! stale registration left behind after teardown would keep delivering
//! events for an abandoned session, so teardown always goes through a full
//! reconnect rather than a selective unsubscribe.

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

const EVENT_BUFFER: usize = 64;

/// Event channel errors
#[derive(Debug, thiserror::Error)]
pub enum EventChannelError {
    #[error("event channel connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to encode register frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Server-pushed events, decoded at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ChannelEvent {
    /// Pairing artifact, or the attempt-limit error in its place.
    #[serde(rename_all = "camelCase")]
    QrCode {
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qr: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The paired device is live.
    #[serde(rename_all = "camelCase")]
    BotConnected { user_id: String },
    /// The device was already connected from a previous session.
    #[serde(rename_all = "camelCase")]
    BotAlreadyRunning { user_id: String },
    /// Global activation toggle, filtered client-side by owner id.
    #[serde(rename_all = "camelCase")]
    BotStatusChanged { user_id: String, status: bool },
}

impl ChannelEvent {
    /// The owner this event is scoped to.
    pub fn owner_id(&self) -> &str {
        match self {
            ChannelEvent::QrCode { user_id, .. }
            | ChannelEvent::BotConnected { user_id }
            | ChannelEvent::BotAlreadyRunning { user_id }
            | ChannelEvent::BotStatusChanged { user_id, .. } => user_id,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterFrame<'a> {
    event: &'static str,
    user_id: &'a str,
}

/// One live registration on the push-event channel.
pub struct EventChannel {
    url: Url,
    owner_id: String,
    events: mpsc::Receiver<ChannelEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventChannel {
    /// Connect and register for the given owner.
    pub async fn connect(url: Url, owner_id: impl Into<String>) -> Result<Self, EventChannelError> {
        let owner_id = owner_id.into();
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
        let (mut sink, mut stream) = socket.split();

        let register = serde_json::to_string(&RegisterFrame {
            event: "register",
            user_id: &owner_id,
        })?;
        sink.send(Message::Text(register)).await?;
        tracing::info!(owner_id = %owner_id, "registered on event channel");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let reader_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                            Ok(event) => {
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "ignoring unrecognized event frame");
                            }
                        },
                        Some(Ok(Message::Ping(payload))) => {
                            if sink.send(Message::Pong(payload)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!("event channel closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "event channel read failed");
                            break;
                        }
                    },
                }
            }
        });

        Ok(Self {
            url,
            owner_id,
            events: rx,
            cancel,
            task,
        })
    }

    /// Receive the next decoded event. `None` means the connection is gone.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Drop the current registration and establish a fresh one. Required on
    /// session teardown: the transport keys registrations by owner identity
    /// and there is no selective unsubscribe.
    pub async fn reconnect(&mut self) -> Result<(), EventChannelError> {
        self.cancel.cancel();
        self.task.abort();
        let fresh = Self::connect(self.url.clone(), self.owner_id.clone()).await?;
        *self = fresh;
        Ok(())
    }

    /// Close the registration for good.
    pub async fn close(self) {
        self.cancel.cancel();
        self.task.abort();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_artifact_event() {
        let raw = r#"{"event":"qr-code","userId":"u1","qr":"2@ABC"}"#;
        let event: ChannelEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            ChannelEvent::QrCode {
                user_id: "u1".to_string(),
                qr: Some("2@ABC".to_string()),
                error: None,
                message: None,
            }
        );
        assert_eq!(event.owner_id(), "u1");
    }

    #[test]
    fn decodes_limit_error_in_artifact_event() {
        let raw = r#"{"event":"qr-code","userId":"u1","error":"LIMITE_ATINGIDO","message":"Limite atingido"}"#;
        let event: ChannelEvent = serde_json::from_str(raw).unwrap();
        match event {
            ChannelEvent::QrCode { qr, error, message, .. } => {
                assert!(qr.is_none());
                assert_eq!(error.as_deref(), Some("LIMITE_ATINGIDO"));
                assert_eq!(message.as_deref(), Some("Limite atingido"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_connection_events() {
        let connected: ChannelEvent =
            serde_json::from_str(r#"{"event":"bot-connected","userId":"u2"}"#).unwrap();
        assert_eq!(connected, ChannelEvent::BotConnected { user_id: "u2".to_string() });

        let running: ChannelEvent =
            serde_json::from_str(r#"{"event":"bot-already-running","userId":"u2"}"#).unwrap();
        assert_eq!(running, ChannelEvent::BotAlreadyRunning { user_id: "u2".to_string() });

        let toggled: ChannelEvent =
            serde_json::from_str(r#"{"event":"bot-status-changed","userId":"u2","status":true}"#)
                .unwrap();
        assert_eq!(
            toggled,
            ChannelEvent::BotStatusChanged { user_id: "u2".to_string(), status: true }
        );
    }

    #[test]
    fn unknown_event_fails_decode() {
        let raw = r#"{"event":"something-new","userId":"u1"}"#;
        assert!(serde_json::from_str::<ChannelEvent>(raw).is_err());
    }

    #[test]
    fn register_frame_matches_wire_shape() {
        let frame = serde_json::to_value(RegisterFrame { event: "register", user_id: "u9" }).unwrap();
        assert_eq!(frame, serde_json::json!({ "event": "register", "userId": "u9" }));
    }
}
