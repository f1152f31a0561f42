// ── Video resolutions ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A rendition the recommender can choose. Ordered by vertical resolution.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum VideoQuality {
    #[serde(rename = "240p")]
    #[strum(serialize = "240p")]
    P240,
    #[serde(rename = "360p")]
    #[strum(serialize = "360p")]
    P360,
    #[serde(rename = "480p")]
    #[strum(serialize = "480p")]
    P480,
    #[serde(rename = "720p")]
    #[strum(serialize = "720p")]
    P720,
    #[serde(rename = "1080p")]
    #[strum(serialize = "1080p")]
    P1080,
}

impl VideoQuality {
    /// Vertical resolution in pixels.
    pub fn height(self) -> u32 {
        match self {
            Self::P240 => 240,
            Self::P360 => 360,
            Self::P480 => 480,
            Self::P720 => 720,
            Self::P1080 => 1080,
        }
    }

    pub fn from_height(height: u32) -> Option<Self> {
        match height {
            240 => Some(Self::P240),
            360 => Some(Self::P360),
            480 => Some(Self::P480),
            720 => Some(Self::P720),
            1080 => Some(Self::P1080),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn labels_round_trip_through_strum() {
        for q in VideoQuality::iter() {
            assert_eq!(q.to_string().parse::<VideoQuality>(), Ok(q));
        }
        assert!("4k".parse::<VideoQuality>().is_err());
    }

    #[test]
    fn ordering_follows_height() {
        let heights: Vec<_> = VideoQuality::iter().map(VideoQuality::height).collect();
        assert_eq!(heights, vec![240, 360, 480, 720, 1080]);
        assert!(VideoQuality::P240 < VideoQuality::P1080);
        assert_eq!(VideoQuality::from_height(720), Some(VideoQuality::P720));
    }
}
