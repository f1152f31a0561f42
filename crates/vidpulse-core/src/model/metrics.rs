// ── Network metric domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Link type reported by the embedding client.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    #[default]
    Unknown,
}

/// Coarse bucket of network fitness, derived purely from the quality score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NetworkCondition {
    VeryPoor,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl NetworkCondition {
    /// `>=9` excellent, `>=7` good, `>=5` fair, `>=3` poor, else very poor.
    pub fn from_score(score: u8) -> Self {
        match score {
            9.. => Self::Excellent,
            7..=8 => Self::Good,
            5..=6 => Self::Fair,
            3..=4 => Self::Poor,
            _ => Self::VeryPoor,
        }
    }
}

/// Point-in-time network metrics, recomputed on every sampling tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub bandwidth_mbps: f64,
    pub latency_ms: f64,
    /// Fraction of failed fragment requests, 0..=1.
    pub packet_loss: f64,
    pub connection_type: ConnectionType,
    /// Always within 1..=10.
    pub quality_score: u8,
    /// Seconds buffered ahead of the playhead.
    pub buffer_health: f64,
    pub timestamp: DateTime<Utc>,
}

impl NetworkMetrics {
    pub fn condition(&self) -> NetworkCondition {
        NetworkCondition::from_score(self.quality_score)
    }
}

/// Fragment-level metrics derived from the sliding windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HlsNetworkMetrics {
    /// Mean fragment load time (ms).
    pub fragment_load_time: f64,
    /// Mean fragment size (bytes).
    pub fragment_size: f64,
    /// Median per-fragment bandwidth (Mbps).
    pub fragment_bandwidth: f64,
    /// Mean time to first byte (ms).
    pub ttfb: f64,
    /// Seconds buffered ahead of the playhead.
    pub buffer_level: f64,
    pub dropped_frames: u64,
    pub loading_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_thresholds() {
        assert_eq!(NetworkCondition::from_score(10), NetworkCondition::Excellent);
        assert_eq!(NetworkCondition::from_score(9), NetworkCondition::Excellent);
        assert_eq!(NetworkCondition::from_score(8), NetworkCondition::Good);
        assert_eq!(NetworkCondition::from_score(7), NetworkCondition::Good);
        assert_eq!(NetworkCondition::from_score(6), NetworkCondition::Fair);
        assert_eq!(NetworkCondition::from_score(5), NetworkCondition::Fair);
        assert_eq!(NetworkCondition::from_score(3), NetworkCondition::Poor);
        assert_eq!(NetworkCondition::from_score(2), NetworkCondition::VeryPoor);
        assert_eq!(NetworkCondition::from_score(1), NetworkCondition::VeryPoor);
    }

    #[test]
    fn condition_is_monotonic_in_score() {
        let conditions: Vec<_> = (1..=10).map(NetworkCondition::from_score).collect();
        assert!(conditions.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn condition_display_is_snake_case() {
        assert_eq!(NetworkCondition::VeryPoor.to_string(), "very_poor");
        assert_eq!(ConnectionType::Wifi.to_string(), "wifi");
        assert_eq!("Ethernet".parse::<ConnectionType>(), Ok(ConnectionType::Ethernet));
    }
}
