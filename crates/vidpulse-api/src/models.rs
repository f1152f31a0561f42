// Video backend response types
//
// Models for the REST endpoints under `/api/videos`. The backend sometimes
// wraps payloads in `{ "data": ... }` and sometimes returns them bare, so
// `ApiResponse<T>` accepts both. Optional fields use `#[serde(default)]`
// because older video records omit them.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// A response body that is either `{ "data": T }` or a bare `T`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiResponse<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> ApiResponse<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

// ── Video catalog ────────────────────────────────────────────────────

/// One rendition of a video, supplied by the backend per video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoQualityInfo {
    /// Rendition label, e.g. `"720p"`.
    pub label: String,
    /// Target bitrate in kbps.
    #[serde(alias = "bitrate_kbps")]
    pub bitrate: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub codec: String,
    /// Playlist URL for this rendition.
    pub url: String,
}

fn default_fps() -> u32 {
    30
}

/// Video metadata from `GET /api/videos/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Duration in seconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub qualities: Vec<VideoQualityInfo>,
}

// ── Viewing sessions ─────────────────────────────────────────────────

/// A viewing session from `POST /api/videos/{id}/sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub video_id: String,
    pub websocket_url: String,
    #[serde(default)]
    pub qualities: Vec<VideoQualityInfo>,
    #[serde(default)]
    pub recommended_quality: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Body of `POST /api/videos/sessions/{id}/network`, and the `data`
/// payload of outbound `network_status` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub bandwidth: f64,
    pub latency: f64,
    pub packet_loss: f64,
    pub connection_type: String,
    pub quality_score: u8,
    pub buffer_health: f64,
    pub timestamp: DateTime<Utc>,
}

// ── Analytics ────────────────────────────────────────────────────────

/// Aggregated viewing analytics from `GET /api/videos/{id}/analytics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoAnalytics {
    pub video_id: String,
    #[serde(default)]
    pub total_views: u64,
    #[serde(default)]
    pub unique_viewers: u64,
    /// Mean watch time in seconds.
    #[serde(default)]
    pub average_watch_time: f64,
    /// Fraction of views that reached the end, 0..=1.
    #[serde(default)]
    pub completion_rate: f64,
    /// View count per quality label.
    #[serde(default)]
    pub quality_distribution: HashMap<String, u64>,
    /// Catch-all for fields we don't model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Probes ───────────────────────────────────────────────────────────

/// Result of one `GET /api/bandwidth-test` download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthSample {
    pub bytes: u64,
    pub elapsed: Duration,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn response_accepts_wrapped_and_bare() {
        let wrapped: ApiResponse<VideoQualityInfo> = serde_json::from_value(serde_json::json!({
            "data": { "label": "720p", "bitrate": 2500, "width": 1280, "height": 720,
                      "fps": 30, "codec": "avc1", "url": "https://cdn/720p.m3u8" }
        }))
        .unwrap();
        assert_eq!(wrapped.into_inner().label, "720p");

        let bare: ApiResponse<VideoQualityInfo> = serde_json::from_value(serde_json::json!({
            "label": "360p", "bitrate_kbps": 800, "width": 640, "height": 360,
            "url": "https://cdn/360p.m3u8"
        }))
        .unwrap();
        let quality = bare.into_inner();
        assert_eq!(quality.bitrate, 800);
        assert_eq!(quality.fps, 30);
        assert!(quality.codec.is_empty());
    }

    #[test]
    fn session_info_parses_iso_expiry() {
        let session: SessionInfo = serde_json::from_str(
            r#"{
                "session_id": "s-1",
                "video_id": "v-1",
                "websocket_url": "wss://api.example.com/ws/sessions/s-1",
                "expires_at": "2026-10-19T12:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(session.session_id, "s-1");
        assert!(session.qualities.is_empty());
        assert!(session.recommended_quality.is_none());
        assert_eq!(session.expires_at.to_rfc3339(), "2026-10-19T12:00:00+00:00");
    }
}
