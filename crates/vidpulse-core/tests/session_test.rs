#![allow(clippy::unwrap_used)]
// Integration tests for `PlaybackSession` against a wiremock backend and a
// local WebSocket peer.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidpulse_core::{
    ClientConfig, CoreError, MonitorInput, NetworkMonitor, NetworkMonitoringConfig, PlaybackEventKind,
    PlaybackSession, PlaybackState, TlsVerification, VideoQuality,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        api_url: Url::parse(&server.uri()).unwrap(),
        token: None,
        tls: TlsVerification::SystemDefaults,
        timeout: Duration::from_secs(5),
        monitoring: NetworkMonitoringConfig {
            enable_bandwidth_monitoring: false,
            enable_latency_monitoring: false,
            buffer_monitoring_interval: Duration::from_millis(20),
            status_report_interval: Duration::from_millis(50),
            ..NetworkMonitoringConfig::default()
        },
    }
}

async fn mount_session(server: &MockServer, ws_url: &str, expires_in: chrono::Duration) {
    Mock::given(method("POST"))
        .and(path("/api/videos/v1/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {
                "session_id": "s-1",
                "video_id": "v1",
                "websocket_url": ws_url,
                "qualities": [
                    { "label": "360p", "bitrate": 800, "width": 640, "height": 360,
                      "url": "https://cdn.example.com/360p.m3u8" },
                    { "label": "720p", "bitrate": 2500, "width": 1280, "height": 720,
                      "url": "https://cdn.example.com/720p.m3u8" }
                ],
                "recommended_quality": "720p",
                "expires_at": (Utc::now() + expires_in).to_rfc3339()
            }
        })))
        .mount(server)
        .await;
}

async fn start(server: &MockServer) -> PlaybackSession {
    let cfg = config(server);
    let api = Arc::new(cfg.api_client().unwrap());
    let monitor = NetworkMonitor::spawn(cfg.monitoring.clone(), CancellationToken::new());
    PlaybackSession::start(api, "v1", monitor, &cfg).await.unwrap()
}

async fn wait_for(
    session: &PlaybackSession,
    pred: impl FnMut(&PlaybackState) -> bool,
) -> PlaybackState {
    let mut rx = session.subscribe_state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for playback state")
        .unwrap()
        .clone()
}

/// A WebSocket server that accepts one connection, forwards every text
/// frame it receives, and writes whatever the test queues.
struct WsPeer {
    url: String,
    to_client: mpsc::UnboundedSender<Message>,
    from_client: mpsc::UnboundedReceiver<serde_json::Value>,
}

async fn ws_peer() -> WsPeer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/s-1", listener.local_addr().unwrap());
    let (to_client, mut outgoing) = mpsc::unbounded_channel::<Message>();
    let (incoming, from_client) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                Some(msg) = outgoing.recv() => {
                    if write.send(msg).await.is_err() {
                        break;
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                        let _ = incoming.send(value);
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
    });

    WsPeer {
        url,
        to_client,
        from_client,
    }
}

// ── Lifecycle tests ─────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_video_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/videos/nope/sessions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "no such video" })))
        .mount(&server)
        .await;

    let cfg = config(&server);
    let api = Arc::new(cfg.api_client().unwrap());
    let monitor = NetworkMonitor::spawn(cfg.monitoring.clone(), CancellationToken::new());
    let err = PlaybackSession::start(api, "nope", monitor.clone(), &cfg)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, CoreError::VideoNotFound { ref video_id } if video_id == "nope"));
    monitor.shutdown().await;
}

#[tokio::test]
async fn test_status_falls_back_to_rest_without_socket() {
    let server = MockServer::start().await;
    mount_session(&server, "ws://127.0.0.1:9/ws/s-1", chrono::Duration::hours(1)).await;
    Mock::given(method("POST"))
        .and(path("/api/videos/sessions/s-1/network"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1..)
        .mount(&server)
        .await;

    let session = start(&server).await;
    assert!(!session.socket_open());
    assert_eq!(session.state().current_quality, Some(VideoQuality::P720));

    let state = wait_for(&session, |s| s.quality_score.is_some()).await;
    assert!(state.condition.is_some());

    // Progress is recorded even though it cannot be sent.
    let err = session.report_progress(30.0, 120.0).await.unwrap_err();
    assert!(matches!(err, CoreError::SocketClosed { .. }));
    assert!((session.state().progress() - 0.25).abs() < f64::EPSILON);

    tokio::time::sleep(Duration::from_millis(150)).await;
    session.end().await;
    assert!(!session.is_active());

    let reports: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/api/videos/sessions/s-1/network")
        .collect();
    assert!(!reports.is_empty());
    let body: serde_json::Value = serde_json::from_slice(&reports[0].body).unwrap();
    assert!(body["quality_score"].as_u64().is_some());
}

#[tokio::test]
async fn test_session_expires() {
    let server = MockServer::start().await;
    mount_session(
        &server,
        "ws://127.0.0.1:9/ws/s-1",
        chrono::Duration::milliseconds(300),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/videos/sessions/s-1/network"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let session = start(&server).await;
    let state = wait_for(&session, |s| s.expired).await;

    assert!(state.expired);
    assert!(!session.is_active());
    assert!(
        session
            .events()
            .iter()
            .any(|e| e.kind == PlaybackEventKind::SessionExpired)
    );
    session.end().await;
}

// ── WebSocket tests ─────────────────────────────────────────────────

#[tokio::test]
async fn test_inbound_messages_reach_the_event_log() {
    let server = MockServer::start().await;
    let mut peer = ws_peer().await;
    mount_session(&server, &peer.url, chrono::Duration::hours(1)).await;

    let session = start(&server).await;
    assert!(session.socket_open());

    peer.to_client
        .send(Message::text(
            json!({
                "type": "quality_recommendation",
                "data": { "recommended_quality": "360p", "reason": "congestion" }
            })
            .to_string(),
        ))
        .unwrap();
    peer.to_client
        .send(Message::text(
            json!({ "type": "preload", "data": { "segments": ["seg-4.ts", "seg-5.ts"] } })
                .to_string(),
        ))
        .unwrap();
    peer.to_client
        .send(Message::text("not json at all"))
        .unwrap();

    let state = wait_for(&session, |s| !s.preload_segments.is_empty()).await;
    assert_eq!(state.last_recommendation, Some(VideoQuality::P360));
    assert_eq!(state.preload_segments, vec!["seg-4.ts", "seg-5.ts"]);

    // Outbound progress arrives at the peer.
    session.report_progress(60.0, 120.0).await.unwrap();
    let sent = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let msg = peer.from_client.recv().await.unwrap();
            if msg["type"] == "progress_update" {
                return msg;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(sent["session_id"], "s-1");
    assert_eq!(sent["data"]["current_time"], 60.0);
    assert_eq!(sent["data"]["progress"], 0.5);

    // Server-side close is recorded and reporting falls back to REST.
    peer.to_client.send(Message::Close(None)).unwrap();
    let state = wait_for(&session, |s| s.socket_closed.is_some()).await;
    assert!(state.socket_closed.is_some());
    assert!(!session.socket_open());

    session.end().await;
    let replayed = session
        .events()
        .iter()
        .fold(PlaybackState::default(), |state, event| state.apply(event));
    assert_eq!(replayed, session.state());
}

#[tokio::test]
async fn test_monitor_decision_is_announced_once() {
    let server = MockServer::start().await;
    let mut peer = ws_peer().await;
    mount_session(&server, &peer.url, chrono::Duration::hours(1)).await;

    let cfg = config(&server);
    let api = Arc::new(cfg.api_client().unwrap());
    let monitor = NetworkMonitor::spawn(cfg.monitoring.clone(), CancellationToken::new());
    let mut decisions = monitor.decisions();
    let session = PlaybackSession::start(api, "v1", monitor.clone(), &cfg).await.unwrap();
    assert!(session.socket_open());

    // Collapse: < 1 Mbps, 800 ms, empty buffer. 240p is not offered, so 360p.
    monitor.record_fragment(1000.0, 10_000, 5.0).await.unwrap();
    monitor.send(MonitorInput::LatencySample(800.0)).await.unwrap();

    let decision = tokio::time::timeout(Duration::from_secs(5), decisions.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decision.from, VideoQuality::P720);
    assert_eq!(decision.to, VideoQuality::P360);

    wait_for(&session, |s| s.current_quality == Some(VideoQuality::P360)).await;
    // Give a duplicate announcement time to show up.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut quality_changes = Vec::new();
    while let Ok(msg) = peer.from_client.try_recv() {
        if msg["type"] == "quality_change" {
            quality_changes.push(msg);
        }
    }
    assert_eq!(quality_changes.len(), 1, "{quality_changes:?}");
    assert_eq!(quality_changes[0]["data"]["from_quality"], "720p");
    assert_eq!(quality_changes[0]["data"]["to_quality"], "360p");

    let logged = session
        .events()
        .iter()
        .filter(|e| matches!(e.kind, PlaybackEventKind::QualityChanged { from: Some(_), .. }))
        .count();
    assert_eq!(logged, 1);
    assert_eq!(session.state().quality_changes, 2);

    session.end().await;
    monitor.shutdown().await;
}
