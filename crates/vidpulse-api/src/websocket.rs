//! Per-session WebSocket transport.
//!
//! One socket per viewing session. Outbound messages (`network_status`,
//! `progress_update`, `quality_change`, `heartbeat`) are stamped with the
//! session id and an ISO-8601 timestamp; inbound messages are dispatched on
//! their `type` field and streamed through a [`tokio::sync::broadcast`]
//! channel.
//!
//! This transport does **not** reconnect. When the socket drops, subscribers
//! receive [`SocketEvent::Closed`] and the owner decides what to do (the
//! playback session falls back to REST reporting). For a reconnecting
//! consumer see [`crate::dashboard`].
//!
//! # Example
//!
//! ```rust,ignore
//! use vidpulse_api::websocket::{OutboundKind, SessionSocket, SocketEvent};
//!
//! let socket = SessionSocket::connect(ws_url, "s-1".into(), None, heartbeat, cancel).await?;
//! let mut rx = socket.subscribe();
//! socket.send(OutboundKind::ProgressUpdate, serde_json::json!({ "position": 42.0 })).await?;
//!
//! while let Ok(event) = rx.recv().await {
//!     if let SocketEvent::Message(msg) = event.as_ref() {
//!         println!("{msg:?}");
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

// ── Outbound messages ────────────────────────────────────────────────

/// Discriminator for client → server messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    NetworkStatus,
    ProgressUpdate,
    QualityChange,
    Heartbeat,
}

/// Wire shape: `{type, data, session_id, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    pub data: serde_json::Value,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl OutboundMessage {
    pub fn new(kind: OutboundKind, data: serde_json::Value, session_id: &str) -> Self {
        Self {
            kind,
            data,
            session_id: session_id.to_owned(),
            timestamp: Utc::now(),
        }
    }

    pub fn heartbeat(session_id: &str) -> Self {
        Self::new(OutboundKind::Heartbeat, serde_json::json!({}), session_id)
    }
}

// ── Inbound messages ─────────────────────────────────────────────────

/// `data` of a `quality_recommendation` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecommendation {
    /// Quality label, e.g. `"480p"`.
    #[serde(alias = "quality")]
    pub recommended_quality: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub network_condition: Option<String>,
}

/// `data` of a `preload` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadHint {
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

/// A parsed server → client message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    QualityRecommendation(QualityRecommendation),
    Preload(PreloadHint),
    AnalyticsEvent(serde_json::Value),
}

/// Raw envelope the server sends: `{ "type": "...", "data": {...} }`.
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl InboundMessage {
    /// Parse a text frame. Returns `None` for malformed JSON or unknown types.
    pub fn parse(text: &str) -> Option<Self> {
        let envelope: WsEnvelope = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to parse WebSocket envelope");
                return None;
            }
        };

        let parsed = match envelope.kind.as_str() {
            "quality_recommendation" => {
                serde_json::from_value(envelope.data).map(Self::QualityRecommendation)
            }
            "preload" => serde_json::from_value(envelope.data).map(Self::Preload),
            "analytics_event" => Ok(Self::AnalyticsEvent(envelope.data)),
            other => {
                tracing::debug!(msg_type = other, "Ignoring unknown WebSocket message type");
                return None;
            }
        };

        match parsed {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    msg_type = %envelope.kind,
                    "Could not deserialize message payload"
                );
                None
            }
        }
    }
}

// ── SocketEvent ──────────────────────────────────────────────────────

/// Everything a subscriber can observe on a session socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Message(InboundMessage),
    Closed { code: Option<u16>, reason: String },
    Error(String),
}

// ── SessionSocket ────────────────────────────────────────────────────

/// Handle to an open session WebSocket.
///
/// The connection is established in [`connect`](Self::connect); a
/// background task then owns the stream, writing queued outbound messages,
/// sending heartbeats and broadcasting inbound events.
pub struct SessionSocket {
    session_id: String,
    outbound_tx: mpsc::Sender<OutboundMessage>,
    event_tx: broadcast::Sender<Arc<SocketEvent>>,
    /// Created before the I/O task starts, so frames pushed right after
    /// the handshake wait for the first subscriber.
    first_rx: Mutex<Option<broadcast::Receiver<Arc<SocketEvent>>>>,
    open: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl SessionSocket {
    /// Open the socket and spawn the I/O task.
    ///
    /// If `token` is provided, it's sent as `Authorization: Bearer` on the
    /// upgrade request. `heartbeat` of `None` or zero disables heartbeats.
    pub async fn connect(
        ws_url: Url,
        session_id: String,
        token: Option<String>,
        heartbeat: Option<Duration>,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        tracing::info!(url = %ws_url, %session_id, "Connecting session WebSocket");

        let uri: tungstenite::http::Uri = ws_url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(token) = token {
            request = request.with_header("Authorization", format!("Bearer {token}"));
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!(%session_id, "Session WebSocket connected");

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let (event_tx, first_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (open_tx, open) = watch::channel(true);

        let task = IoTask {
            session_id: session_id.clone(),
            event_tx: event_tx.clone(),
            open_tx,
            heartbeat: heartbeat.filter(|period| !period.is_zero()),
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run(ws_stream, outbound_rx));

        Ok(Self {
            session_id,
            outbound_tx,
            event_tx,
            first_rx: Mutex::new(Some(first_rx)),
            open,
            cancel,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether the I/O task still holds a live connection.
    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    /// Get a receiver for inbound messages and close/error events.
    ///
    /// The first call sees everything since the handshake; later calls see
    /// events from the moment they subscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SocketEvent>> {
        self.first_rx
            .lock()
            .expect("socket receiver lock poisoned")
            .take()
            .unwrap_or_else(|| self.event_tx.subscribe())
    }

    /// Queue an outbound message of the given type.
    pub async fn send(&self, kind: OutboundKind, data: serde_json::Value) -> Result<(), Error> {
        if !self.is_open() {
            return Err(Error::SocketClosed {
                session_id: self.session_id.clone(),
            });
        }
        self.outbound_tx
            .send(OutboundMessage::new(kind, data, &self.session_id))
            .await
            .map_err(|_| Error::SocketClosed {
                session_id: self.session_id.clone(),
            })
    }

    /// Close the socket (sends a close frame) and stop the I/O task.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

// ── I/O task ─────────────────────────────────────────────────────────

struct IoTask {
    session_id: String,
    event_tx: broadcast::Sender<Arc<SocketEvent>>,
    open_tx: watch::Sender<bool>,
    heartbeat: Option<Duration>,
    cancel: CancellationToken,
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

impl IoTask {
    async fn run(self, ws_stream: WsStream, mut outbound_rx: mpsc::Receiver<OutboundMessage>) {
        let (mut write, mut read) = ws_stream.split();

        // The select guard skips the tick entirely when heartbeats are off.
        let period = self.heartbeat.unwrap_or(Duration::from_secs(86_400));
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let closed = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let _ = write.send(tungstenite::Message::Close(None)).await;
                    break SocketEvent::Closed { code: None, reason: "closed by client".into() };
                }
                Some(msg) = outbound_rx.recv() => {
                    if let Err(e) = write_message(&mut write, &msg).await {
                        break SocketEvent::Error(e.to_string());
                    }
                }
                _ = heartbeat.tick(), if self.heartbeat.is_some() => {
                    tracing::trace!(session_id = %self.session_id, "heartbeat");
                    let msg = OutboundMessage::heartbeat(&self.session_id);
                    if let Err(e) = write_message(&mut write, &msg).await {
                        break SocketEvent::Error(e.to_string());
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(msg) = InboundMessage::parse(&text) {
                            // No subscribers is fine.
                            let _ = self.event_tx.send(Arc::new(SocketEvent::Message(msg)));
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|cf| (Some(u16::from(cf.code)), cf.reason.to_string()))
                            .unwrap_or((None, String::new()));
                        tracing::info!(?code, %reason, "Session WebSocket close frame received");
                        break SocketEvent::Closed { code, reason };
                    }
                    Some(Err(e)) => break SocketEvent::Error(e.to_string()),
                    None => {
                        break SocketEvent::Closed { code: None, reason: "stream ended".into() };
                    }
                    // Ping/Pong/Binary -- tungstenite answers pings itself
                    Some(Ok(_)) => {}
                },
            }
        };

        let _ = self.open_tx.send(false);
        if let SocketEvent::Error(ref e) = closed {
            tracing::warn!(session_id = %self.session_id, error = %e, "Session WebSocket error");
        }
        let _ = self.event_tx.send(Arc::new(closed));
        tracing::debug!(session_id = %self.session_id, "Session WebSocket task exiting");
    }
}

async fn write_message<S>(write: &mut S, msg: &OutboundMessage) -> Result<(), Error>
where
    S: futures_util::Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(msg).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })?;
    write
        .send(tungstenite::Message::text(text))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn outbound_message_wire_shape() {
        let msg = OutboundMessage::new(
            OutboundKind::NetworkStatus,
            serde_json::json!({ "bandwidth": 4.2 }),
            "s-42",
        );
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "network_status");
        assert_eq!(value["session_id"], "s-42");
        assert_eq!(value["data"]["bandwidth"], 4.2);
        let ts = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "not ISO-8601: {ts}");
    }

    #[test]
    fn heartbeat_has_empty_data() {
        let value = serde_json::to_value(OutboundMessage::heartbeat("s-1")).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert_eq!(value["data"], serde_json::json!({}));
    }

    #[test]
    fn outbound_kinds_use_snake_case() {
        for (kind, name) in [
            (OutboundKind::NetworkStatus, "network_status"),
            (OutboundKind::ProgressUpdate, "progress_update"),
            (OutboundKind::QualityChange, "quality_change"),
            (OutboundKind::Heartbeat, "heartbeat"),
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), name);
        }
    }

    #[test]
    fn parse_quality_recommendation() {
        let raw = serde_json::json!({
            "type": "quality_recommendation",
            "data": { "recommended_quality": "480p", "reason": "bandwidth drop" },
            "session_id": "s-1"
        });

        let msg = InboundMessage::parse(&raw.to_string()).unwrap();
        assert_eq!(
            msg,
            InboundMessage::QualityRecommendation(QualityRecommendation {
                recommended_quality: "480p".into(),
                reason: Some("bandwidth drop".into()),
                network_condition: None,
            })
        );
    }

    #[test]
    fn parse_preload_and_analytics() {
        let preload = InboundMessage::parse(
            r#"{"type":"preload","data":{"segments":["seg-10.ts","seg-11.ts"],"quality":"720p"}}"#,
        )
        .unwrap();
        let InboundMessage::Preload(hint) = preload else {
            panic!("expected preload, got {preload:?}");
        };
        assert_eq!(hint.segments.len(), 2);
        assert_eq!(hint.quality.as_deref(), Some("720p"));

        let analytics =
            InboundMessage::parse(r#"{"type":"analytics_event","data":{"viewers":12}}"#).unwrap();
        assert!(matches!(analytics, InboundMessage::AnalyticsEvent(ref v) if v["viewers"] == 12));
    }

    #[test]
    fn parse_skips_unknown_and_malformed() {
        assert!(InboundMessage::parse("not json at all").is_none());
        assert!(InboundMessage::parse(r#"{"type":"mystery","data":{}}"#).is_none());
        assert!(InboundMessage::parse(r#"{"type":"quality_recommendation","data":{}}"#).is_none());
    }
}
