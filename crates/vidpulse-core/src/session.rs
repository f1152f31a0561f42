// ── Playback session ──
//
// Lifecycle of one viewing session: create it over REST, open its
// WebSocket, then keep the backend informed (status reports, progress,
// quality changes) until the session ends or expires. Everything that
// happens is appended to the session's playback event log.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vidpulse_api::{
    InboundMessage, NetworkReport, OutboundKind, SessionSocket, SocketEvent, VideoApiClient,
};

use crate::config::ClientConfig;
use crate::convert::parse_quality_label;
use crate::error::CoreError;
use crate::model::{NetworkMetrics, Session, VideoQuality};
use crate::monitor::{MonitorInput, NetworkMonitor};
use crate::playback::{EventLog, PlaybackEvent, PlaybackEventKind, PlaybackState};
use crate::recommender::QualityDecision;

/// Handle to an active viewing session.
///
/// Cheaply cloneable. Background tasks stop when [`end`](Self::end) is
/// called or the session expires.
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    session: Session,
    api: Arc<VideoApiClient>,
    socket: Option<SessionSocket>,
    monitor: NetworkMonitor,
    log: Mutex<EventLog>,
    state_tx: watch::Sender<PlaybackState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PlaybackSession {
    /// Create a session for `video_id` and start reporting.
    ///
    /// A WebSocket that cannot be opened is not fatal: status reports fall
    /// back to REST for the life of the session.
    pub async fn start(
        api: Arc<VideoApiClient>,
        video_id: &str,
        monitor: NetworkMonitor,
        config: &ClientConfig,
    ) -> Result<Self, CoreError> {
        let info = api
            .create_session(video_id)
            .await
            .map_err(|e| CoreError::for_video(e, video_id))?;
        let session = Session::try_from(info)?;
        info!(
            session_id = %session.session_id,
            video_id = %session.video_id,
            expires_at = %session.expires_at,
            "playback session created"
        );

        if session.is_expired(Utc::now()) {
            return Err(CoreError::SessionExpired {
                session_id: session.session_id,
            });
        }

        monitor
            .send(MonitorInput::AvailableQualities(session.available.clone()))
            .await?;
        if let Some(initial) = session.recommended_quality {
            monitor.set_current_quality(initial).await?;
        }

        let cancel = CancellationToken::new();
        let monitoring = config.monitoring.clone().with_minimum_periods();
        let token = config
            .token
            .as_ref()
            .map(|t| t.expose_secret().to_owned());
        let socket = match SessionSocket::connect(
            session.websocket_url.clone(),
            session.session_id.clone(),
            token,
            Some(monitoring.websocket_heartbeat_interval),
            cancel.child_token(),
        )
        .await
        {
            Ok(socket) => Some(socket),
            Err(e) => {
                warn!(error = %e, "session socket unavailable, reporting over REST");
                None
            }
        };
        let socket_events = socket.as_ref().map(SessionSocket::subscribe);
        let decisions = monitor.decisions();

        let (state_tx, _) = watch::channel(PlaybackState::default());
        let this = Self {
            inner: Arc::new(SessionInner {
                session,
                api,
                socket,
                monitor,
                log: Mutex::new(EventLog::new()),
                state_tx,
                cancel: cancel.clone(),
                task_handles: Mutex::new(Vec::new()),
            }),
        };

        if let Some(initial) = this.inner.session.recommended_quality {
            this.record(PlaybackEventKind::QualityChanged {
                from: None,
                to: initial,
                reason: "initial".into(),
            });
        }

        let mut handles = vec![
            tokio::spawn(status_task(
                this.clone(),
                monitoring.status_report_interval,
                cancel.clone(),
            )),
            tokio::spawn(decision_task(this.clone(), decisions, cancel.clone())),
            tokio::spawn(expiry_task(this.clone(), cancel.clone())),
        ];
        if let Some(rx) = socket_events {
            handles.push(tokio::spawn(inbound_task(this.clone(), rx, cancel)));
        }
        this.inner
            .task_handles
            .lock()
            .expect("session task list lock poisoned")
            .extend(handles);

        Ok(this)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session.session_id
    }

    /// `false` once the session has ended or expired.
    pub fn is_active(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    pub fn socket_open(&self) -> bool {
        self.inner.socket.as_ref().is_some_and(SessionSocket::is_open)
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.inner.state_tx.borrow().clone()
    }

    /// Observe playback state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state_tx.subscribe()
    }

    /// Copy of the event log so far.
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.lock_log().events().to_vec()
    }

    // ── Outbound ─────────────────────────────────────────────────────

    /// Record playback progress and send a `progress_update`.
    pub async fn report_progress(&self, position: f64, duration: f64) -> Result<(), CoreError> {
        self.record(PlaybackEventKind::ProgressUpdated { position, duration });
        let progress = if duration > 0.0 {
            (position / duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.send(
            OutboundKind::ProgressUpdate,
            serde_json::json!({
                "current_time": position,
                "duration": duration,
                "progress": progress,
            }),
        )
        .await
    }

    /// Record a quality change, tell the monitor, and send a
    /// `quality_change`. The event is recorded even if the socket is down.
    pub async fn change_quality(
        &self,
        from: Option<VideoQuality>,
        to: VideoQuality,
        reason: &str,
    ) -> Result<(), CoreError> {
        self.record(PlaybackEventKind::QualityChanged {
            from,
            to,
            reason: reason.to_owned(),
        });
        self.inner.monitor.set_current_quality(to).await?;
        self.send(
            OutboundKind::QualityChange,
            serde_json::json!({
                "from_quality": from,
                "to_quality": to,
                "reason": reason,
            }),
        )
        .await
    }

    /// Push the latest metrics: over the socket when it is open, else via
    /// `POST /api/videos/sessions/{id}/network`.
    pub async fn report_status(&self) -> Result<(), CoreError> {
        let metrics = self.inner.monitor.snapshot();
        self.record(PlaybackEventKind::MetricsUpdated {
            quality_score: metrics.quality_score,
            bandwidth_mbps: metrics.bandwidth_mbps,
            buffer_health: metrics.buffer_health,
        });

        if let Some(socket) = self.open_socket() {
            match socket
                .send(OutboundKind::NetworkStatus, status_payload(&metrics))
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => debug!(error = %e, "socket send failed, falling back to REST"),
            }
        }

        self.inner
            .api
            .report_network(self.session_id(), &NetworkReport::from(metrics.as_ref()))
            .await?;
        Ok(())
    }

    /// Stop background tasks and close the socket. Idempotent.
    pub async fn end(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!(session_id = %self.session_id(), "ending playback session");
        }
        self.inner.cancel.cancel();
        if let Some(socket) = &self.inner.socket {
            socket.close();
        }

        let handles: Vec<_> = self
            .inner
            .task_handles
            .lock()
            .expect("session task list lock poisoned")
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn lock_log(&self) -> std::sync::MutexGuard<'_, EventLog> {
        self.inner.log.lock().expect("playback log lock poisoned")
    }

    fn record(&self, kind: PlaybackEventKind) {
        let mut log = self.lock_log();
        let sequence = log.append(kind, Utc::now()).sequence;
        let state = log.state().clone();
        drop(log);
        debug!(sequence, "playback event");
        self.inner.state_tx.send_replace(state);
    }

    fn open_socket(&self) -> Option<&SessionSocket> {
        self.inner.socket.as_ref().filter(|s| s.is_open())
    }

    async fn send(&self, kind: OutboundKind, data: serde_json::Value) -> Result<(), CoreError> {
        let socket = self.open_socket().ok_or_else(|| CoreError::SocketClosed {
            reason: format!("session {}", self.session_id()),
        })?;
        socket.send(kind, data).await?;
        Ok(())
    }

    /// Apply one socket event; `false` once the socket is gone.
    fn handle_socket_event(&self, event: &SocketEvent) -> bool {
        match event {
            SocketEvent::Message(InboundMessage::QualityRecommendation(rec)) => {
                debug!(quality = %rec.recommended_quality, "server quality recommendation");
                self.record(PlaybackEventKind::RecommendationReceived {
                    quality: parse_quality_label(&rec.recommended_quality),
                    label: rec.recommended_quality.clone(),
                    reason: rec.reason.clone(),
                });
                true
            }
            SocketEvent::Message(InboundMessage::Preload(hint)) => {
                debug!(segments = hint.segments.len(), "preload hint");
                self.record(PlaybackEventKind::PreloadRequested {
                    segments: hint.segments.clone(),
                    quality: hint.quality.clone(),
                });
                true
            }
            SocketEvent::Message(InboundMessage::AnalyticsEvent(data)) => {
                debug!(%data, "analytics event");
                true
            }
            SocketEvent::Error(reason) => {
                self.record(PlaybackEventKind::SocketClosed {
                    code: None,
                    reason: reason.clone(),
                });
                false
            }
            SocketEvent::Closed { code, reason } => {
                self.record(PlaybackEventKind::SocketClosed {
                    code: *code,
                    reason: reason.clone(),
                });
                false
            }
        }
    }
}

fn status_payload(metrics: &NetworkMetrics) -> serde_json::Value {
    serde_json::json!({
        "bandwidth": metrics.bandwidth_mbps,
        "latency": metrics.latency_ms,
        "packet_loss": metrics.packet_loss,
        "connection_type": metrics.connection_type,
        "quality_score": metrics.quality_score,
        "buffer_health": metrics.buffer_health,
        "network_condition": metrics.condition(),
        "timestamp": metrics.timestamp,
    })
}

// ── Background tasks ─────────────────────────────────────────────────

async fn status_task(session: PlaybackSession, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = session.report_status().await {
                    warn!(error = %e, "status report failed");
                }
            }
        }
    }
}

async fn decision_task(
    session: PlaybackSession,
    mut rx: broadcast::Receiver<QualityDecision>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            decision = rx.recv() => match decision {
                Ok(d) => {
                    let reason = d.reason.to_string();
                    if let Err(e) = session.change_quality(Some(d.from), d.to, &reason).await {
                        warn!(error = %e, to = %d.to, "could not announce quality change");
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "quality decisions lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn inbound_task(
    session: PlaybackSession,
    mut rx: broadcast::Receiver<Arc<SocketEvent>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(event) => {
                    if !session.handle_socket_event(&event) {
                        info!(session_id = %session.session_id(), "session socket closed");
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "socket events lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn expiry_task(session: PlaybackSession, cancel: CancellationToken) {
    let remaining = session.inner.session.remaining(Utc::now());
    tokio::select! {
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(remaining) => {}
    }

    warn!(session_id = %session.session_id(), "playback session expired");
    session.record(PlaybackEventKind::SessionExpired);
    if let Some(socket) = &session.inner.socket {
        socket.close();
    }
    cancel.cancel();
}
