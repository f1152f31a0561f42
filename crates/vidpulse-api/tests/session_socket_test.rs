#![allow(clippy::unwrap_used)]
// Integration tests for `SessionSocket` against a local WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use vidpulse_api::{InboundMessage, OutboundKind, SessionSocket, SocketEvent};

/// Accept one connection, write `greeting` right after the handshake, then
/// forward every text frame the client sends.
async fn server(greeting: Option<Message>) -> (Url, mpsc::UnboundedReceiver<serde_json::Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/ws/s-1", listener.local_addr().unwrap())).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        if let Some(msg) = greeting {
            ws.send(msg).await.unwrap();
        }
        while let Some(Ok(frame)) = ws.next().await {
            if let Message::Text(text) = frame {
                let _ = tx.send(serde_json::from_str(text.as_str()).unwrap());
            }
        }
    });

    (url, rx)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_frame_pushed_on_connect_reaches_late_subscriber() {
    let greeting = Message::text(
        json!({
            "type": "quality_recommendation",
            "data": { "recommended_quality": "480p" }
        })
        .to_string(),
    );
    let (url, _rx) = server(Some(greeting)).await;

    let socket = SessionSocket::connect(url, "s-1".into(), None, None, CancellationToken::new())
        .await
        .unwrap();
    // The I/O task has long broadcast the greeting by now.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut events = socket.subscribe();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event.as_ref() {
        SocketEvent::Message(InboundMessage::QualityRecommendation(rec)) => {
            assert_eq!(rec.recommended_quality, "480p");
        }
        other => panic!("expected a recommendation, got {other:?}"),
    }

    socket.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_zero_heartbeat_disables_heartbeats() {
    let (url, mut from_client) = server(None).await;

    let socket = SessionSocket::connect(
        url,
        "s-1".into(),
        None,
        Some(Duration::ZERO),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert!(socket.is_open());

    socket
        .send(OutboundKind::ProgressUpdate, json!({ "current_time": 5.0 }))
        .await
        .unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), from_client.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first["type"], "progress_update");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(socket.is_open());
    assert!(from_client.try_recv().is_err(), "no heartbeat expected");

    socket.close();
}
