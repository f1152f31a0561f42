#![allow(clippy::unwrap_used)]
// Integration tests for `VideoApiClient` using wiremock.

use chrono::{TimeZone, Utc};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidpulse_api::{Error, NetworkReport, TransportConfig, VideoApiClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, VideoApiClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = VideoApiClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn quality_json(label: &str, height: u32, bitrate: u32) -> serde_json::Value {
    json!({
        "label": label,
        "bitrate": bitrate,
        "width": height * 16 / 9,
        "height": height,
        "fps": 30,
        "codec": "avc1.64001f",
        "url": format!("https://cdn.example.com/v1/{label}.m3u8")
    })
}

// ── Video tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_video_wrapped() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/videos/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "v1",
                "title": "Ownership and Borrowing",
                "duration": 612.5,
                "qualities": [quality_json("360p", 360, 800), quality_json("720p", 720, 2500)]
            }
        })))
        .mount(&server)
        .await;

    let video = client.get_video("v1").await.unwrap();

    assert_eq!(video.id, "v1");
    assert_eq!(video.title, "Ownership and Borrowing");
    assert_eq!(video.qualities.len(), 2);
    assert_eq!(video.qualities[1].label, "720p");
    assert_eq!(video.qualities[1].bitrate, 2500);
}

#[tokio::test]
async fn test_get_video_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/videos/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Video not found" })),
        )
        .mount(&server)
        .await;

    let err = client.get_video("missing").await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err:?}");
    assert!(matches!(err, Error::Api { ref message, .. } if message == "Video not found"));
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/videos/v1/analytics"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client.get_analytics("v1").await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    let token: secrecy::SecretString = "s3cret".to_string().into();
    let client = VideoApiClient::new(
        Url::parse(&server.uri()).unwrap(),
        Some(&token),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/videos/v1"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "v1", "title": "Intro" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let video = client.get_video("v1").await.unwrap();
    assert_eq!(video.title, "Intro");
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_create_session() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/videos/v1/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "session_id": "sess-9",
            "video_id": "v1",
            "websocket_url": "wss://api.example.com/ws/video/sess-9",
            "qualities": [quality_json("480p", 480, 1200)],
            "recommended_quality": "480p",
            "expires_at": "2026-10-19T14:00:00Z"
        })))
        .mount(&server)
        .await;

    let session = client.create_session("v1").await.unwrap();
    assert_eq!(session.session_id, "sess-9");
    assert_eq!(session.recommended_quality.as_deref(), Some("480p"));
    assert_eq!(
        session.expires_at,
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_report_network() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/videos/sessions/sess-9/network"))
        .and(body_partial_json(json!({
            "quality_score": 7,
            "connection_type": "wifi"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let report = NetworkReport {
        bandwidth: 3.5,
        latency: 80.0,
        packet_loss: 0.0,
        connection_type: "wifi".into(),
        quality_score: 7,
        buffer_health: 12.0,
        timestamp: Utc::now(),
    };
    client.report_network("sess-9", &report).await.unwrap();
}

#[tokio::test]
async fn test_get_analytics_bare() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/videos/v1/analytics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video_id": "v1",
            "total_views": 120,
            "unique_viewers": 87,
            "average_watch_time": 301.2,
            "completion_rate": 0.64,
            "quality_distribution": { "720p": 80, "480p": 40 },
            "peak_concurrent": 9
        })))
        .mount(&server)
        .await;

    let analytics = client.get_analytics("v1").await.unwrap();
    assert_eq!(analytics.total_views, 120);
    assert_eq!(analytics.quality_distribution.get("720p"), Some(&80));
    assert_eq!(analytics.extra["peak_concurrent"], 9);
}

#[tokio::test]
async fn test_malformed_body_keeps_raw_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/videos/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.get_video("v1").await.unwrap_err();
    let Error::Deserialization { body, .. } = err else {
        panic!("expected Deserialization, got: {err:?}");
    };
    assert_eq!(body, "<html>oops</html>");
}

// ── Probe tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_ping_measures_round_trip() {
    let (server, client) = setup().await;

    Mock::given(method("HEAD"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let rtt = client.ping().await.unwrap();
    assert!(rtt < std::time::Duration::from_secs(5));
}

#[tokio::test]
async fn test_bandwidth_test_counts_bytes() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/bandwidth-test"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0_u8; 256 * 1024]))
        .mount(&server)
        .await;

    let sample = client.bandwidth_test().await.unwrap();
    assert_eq!(sample.bytes, 256 * 1024);
    assert!(sample.elapsed > std::time::Duration::ZERO);
}

#[tokio::test]
async fn test_ping_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("HEAD"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 503, .. }));
    assert!(err.is_transient());
}
