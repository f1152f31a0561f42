//! Dashboard live feed with bounded auto-reconnect.
//!
//! Connects to the backend's dashboard WebSocket and streams parsed events
//! through a [`tokio::sync::broadcast`] channel. Unlike the session socket,
//! this consumer reconnects with exponential backoff (3s, 6s, 12s, ...) and
//! gives up after [`ReconnectConfig::max_retries`] consecutive failed
//! attempts, leaving the feed in [`FeedState::Failed`].
//!
//! # Example
//!
//! ```rust,ignore
//! use vidpulse_api::dashboard::{DashboardFeed, ReconnectConfig};
//!
//! let feed = DashboardFeed::connect(ws_url, ReconnectConfig::default(), None, cancel.clone());
//! let mut rx = feed.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: {}", event.kind, event.data);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::Error;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── DashboardEvent ───────────────────────────────────────────────────

/// A parsed dashboard push message: `{ "type": "...", "data": {...} }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl DashboardEvent {
    fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text)
            .inspect_err(|e| debug!(error = %e, "skipping malformed dashboard frame"))
            .ok()
    }
}

// ── FeedState ────────────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    Connecting,
    Connected,
    /// Waiting `retry_in` before reconnection attempt number `attempt`.
    Reconnecting { attempt: u32, retry_in: Duration },
    /// Reconnect budget exhausted; the feed will not try again.
    Failed,
    Closed,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for dashboard reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 3s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Maximum consecutive reconnection attempts before giving up.
    /// `None` means retry forever. Default: 5.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(3000),
            max_delay: Duration::from_secs(60),
            max_retries: Some(5),
        }
    }
}

impl ReconnectConfig {
    /// `min(initial * 2^retry, max)`, where `retry` counts from zero.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2_u32.saturating_pow(retry))
            .min(self.max_delay)
    }

    fn exhausted(&self, failures: u32) -> bool {
        self.max_retries.is_some_and(|max| failures > max)
    }
}

// ── DashboardFeed ────────────────────────────────────────────────────

/// Handle to a running dashboard feed.
pub struct DashboardFeed {
    event_rx: broadcast::Receiver<Arc<DashboardEvent>>,
    state: watch::Receiver<FeedState>,
    cancel: CancellationToken,
}

impl DashboardFeed {
    /// Spawn the reconnection loop. Returns immediately; the first
    /// connection attempt happens asynchronously.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        token: Option<String>,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(FeedState::Connecting);

        let runner = FeedRunner {
            url: ws_url,
            token,
            reconnect,
            events: event_tx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(runner.run());

        Self {
            event_rx,
            state,
            cancel,
        }
    }

    /// Get a new broadcast receiver for the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DashboardEvent>> {
        self.event_rx.resubscribe()
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background task ──────────────────────────────────────────────────

/// How one connection ended.
enum Disconnect {
    /// Cancelled by the owner.
    Cancelled,
    /// The server closed or the stream ended after a successful handshake.
    Dropped,
    /// The handshake or the stream failed.
    Failed(Error),
}

struct FeedRunner {
    url: Url,
    token: Option<String>,
    reconnect: ReconnectConfig,
    events: broadcast::Sender<Arc<DashboardEvent>>,
    state: watch::Sender<FeedState>,
    cancel: CancellationToken,
}

impl FeedRunner {
    /// Connect, read until disconnect, back off, repeat.
    ///
    /// The retry budget counts consecutive failed connection attempts; any
    /// connection that completes its handshake restores it.
    async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            let (outcome, handshaken) = self.connect_once().await;
            if handshaken {
                failures = 0;
            }

            match outcome {
                Disconnect::Cancelled => break,
                Disconnect::Dropped => info!("dashboard feed dropped, reconnecting"),
                Disconnect::Failed(e) => warn!(error = %e, failures, "dashboard feed error"),
            }

            failures += 1;
            if self.reconnect.exhausted(failures) {
                error!(
                    max_retries = ?self.reconnect.max_retries,
                    "dashboard reconnection limit reached, giving up"
                );
                self.state.send_replace(FeedState::Failed);
                return;
            }

            let retry_in = self.reconnect.delay_for(failures - 1);
            self.state.send_replace(FeedState::Reconnecting {
                attempt: failures,
                retry_in,
            });
            debug!(?retry_in, attempt = failures, "waiting before reconnect");

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(retry_in) => {}
            }
        }

        self.state.send_replace(FeedState::Closed);
        debug!("dashboard feed stopped");
    }

    /// One connection lifecycle. Also reports whether the handshake
    /// succeeded.
    async fn connect_once(&self) -> (Disconnect, bool) {
        info!(url = %self.url, "connecting to dashboard feed");

        let connecting = async {
            let uri: tungstenite::http::Uri = self
                .url
                .as_str()
                .parse()
                .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
            let mut request = ClientRequestBuilder::new(uri);
            if let Some(ref token) = self.token {
                request = request.with_header("Authorization", format!("Bearer {token}"));
            }
            tokio_tungstenite::connect_async(request)
                .await
                .map(|(ws, _)| ws)
                .map_err(|e| Error::WebSocketConnect(e.to_string()))
        };

        let ws = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return (Disconnect::Cancelled, false),
            result = connecting => match result {
                Ok(ws) => ws,
                Err(e) => return (Disconnect::Failed(e), false),
            },
        };

        self.state.send_replace(FeedState::Connected);
        info!("dashboard feed connected");

        let (_write, mut read) = ws.split();
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return (Disconnect::Cancelled, true),
                frame = read.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = DashboardEvent::parse(&text) {
                        // No subscribers is fine.
                        let _ = self.events.send(Arc::new(event));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(cf) = frame {
                        info!(code = %cf.code, reason = %cf.reason, "dashboard close frame");
                    }
                    return (Disconnect::Dropped, true);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return (Disconnect::Failed(Error::WebSocketConnect(e.to_string())), true);
                }
                None => return (Disconnect::Dropped, true),
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
