// ── Viewing session domain type ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use vidpulse_api::VideoQualityInfo;

use super::quality::VideoQuality;

/// A viewing session, created when playback starts and destroyed when it
/// ends or expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub video_id: String,
    pub websocket_url: Url,
    /// Catalog entries exactly as the backend supplied them.
    pub qualities: Vec<VideoQualityInfo>,
    /// The subset of `qualities` the recommender understands, ascending.
    pub available: Vec<VideoQuality>,
    pub recommended_quality: Option<VideoQuality>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Time left until expiry, zero if already expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now).to_std().unwrap_or_default()
    }
}
