// ── API-to-domain type conversions ──
//
// Bridges raw `vidpulse_api` types into `vidpulse_core::model` domain types
// and back. Quality labels are parsed into `VideoQuality`, falling back to
// the rendition height when the label is non-standard.

use url::Url;
use vidpulse_api::{NetworkReport, SessionInfo, VideoQualityInfo};

use crate::error::CoreError;
use crate::model::{NetworkMetrics, Session, VideoQuality};

// ── Qualities ──────────────────────────────────────────────────────

/// Map a catalog entry to a recommender quality (`"720p"` or `height: 720`).
pub fn quality_of(info: &VideoQualityInfo) -> Option<VideoQuality> {
    info.label
        .trim()
        .to_ascii_lowercase()
        .parse()
        .ok()
        .or_else(|| VideoQuality::from_height(info.height))
}

/// Recommender qualities present in a catalog, ascending and deduplicated.
pub fn available_qualities(infos: &[VideoQualityInfo]) -> Vec<VideoQuality> {
    let mut qualities: Vec<VideoQuality> = infos.iter().filter_map(quality_of).collect();
    qualities.sort_unstable();
    qualities.dedup();
    qualities
}

/// Parse a bare quality label as it appears in WebSocket payloads.
pub fn parse_quality_label(label: &str) -> Option<VideoQuality> {
    label.trim().to_ascii_lowercase().parse().ok()
}

// ── Session ────────────────────────────────────────────────────────

impl TryFrom<SessionInfo> for Session {
    type Error = CoreError;

    fn try_from(info: SessionInfo) -> Result<Self, Self::Error> {
        let websocket_url = Url::parse(&info.websocket_url).map_err(|e| CoreError::Config {
            message: format!("invalid session websocket_url '{}': {e}", info.websocket_url),
        })?;
        let available = available_qualities(&info.qualities);
        let recommended_quality = info
            .recommended_quality
            .as_deref()
            .and_then(parse_quality_label);

        Ok(Session {
            session_id: info.session_id,
            video_id: info.video_id,
            websocket_url,
            qualities: info.qualities,
            available,
            recommended_quality,
            expires_at: info.expires_at,
        })
    }
}

// ── Metrics ────────────────────────────────────────────────────────

impl From<&NetworkMetrics> for NetworkReport {
    fn from(m: &NetworkMetrics) -> Self {
        NetworkReport {
            bandwidth: m.bandwidth_mbps,
            latency: m.latency_ms,
            packet_loss: m.packet_loss,
            connection_type: m.connection_type.to_string(),
            quality_score: m.quality_score,
            buffer_health: m.buffer_health,
            timestamp: m.timestamp,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::model::ConnectionType;

    fn info(label: &str, height: u32) -> VideoQualityInfo {
        VideoQualityInfo {
            label: label.into(),
            bitrate: 1000,
            width: height * 16 / 9,
            height,
            fps: 30,
            codec: "avc1".into(),
            url: format!("https://cdn.example.com/{label}.m3u8"),
        }
    }

    #[test]
    fn quality_from_label_or_height() {
        assert_eq!(quality_of(&info("720p", 720)), Some(VideoQuality::P720));
        assert_eq!(quality_of(&info("HD", 1080)), Some(VideoQuality::P1080));
        assert_eq!(quality_of(&info("1440p", 1440)), None);
    }

    #[test]
    fn available_is_sorted_and_deduplicated() {
        let infos = vec![info("720p", 720), info("240p", 240), info("HD", 720)];
        assert_eq!(
            available_qualities(&infos),
            vec![VideoQuality::P240, VideoQuality::P720]
        );
    }

    #[test]
    fn session_conversion() {
        let session = Session::try_from(SessionInfo {
            session_id: "s-1".into(),
            video_id: "v-1".into(),
            websocket_url: "wss://api.example.com/ws/s-1".into(),
            qualities: vec![info("480p", 480), info("360p", 360)],
            recommended_quality: Some("480P".into()),
            expires_at: Utc::now(),
        })
        .unwrap();

        assert_eq!(session.available, vec![VideoQuality::P360, VideoQuality::P480]);
        assert_eq!(session.recommended_quality, Some(VideoQuality::P480));
    }

    #[test]
    fn session_conversion_rejects_bad_url() {
        let result = Session::try_from(SessionInfo {
            session_id: "s-1".into(),
            video_id: "v-1".into(),
            websocket_url: "not a url".into(),
            qualities: vec![],
            recommended_quality: None,
            expires_at: Utc::now(),
        });
        assert!(matches!(result, Err(CoreError::Config { .. })));
    }

    #[test]
    fn metrics_to_report() {
        let metrics = NetworkMetrics {
            bandwidth_mbps: 4.0,
            latency_ms: 120.0,
            packet_loss: 0.02,
            connection_type: ConnectionType::Cellular,
            quality_score: 6,
            buffer_health: 8.0,
            timestamp: Utc::now(),
        };
        let report = NetworkReport::from(&metrics);
        assert_eq!(report.connection_type, "cellular");
        assert_eq!(report.quality_score, 6);
        assert!((report.bandwidth - 4.0).abs() < f64::EPSILON);
    }
}
