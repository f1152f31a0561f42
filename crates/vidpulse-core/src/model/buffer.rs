// ── Buffered media ranges ──

use serde::{Deserialize, Serialize};

/// A contiguous buffered span of media, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Where the playhead is and what the player has buffered around it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackPosition {
    pub current_time: f64,
    pub buffered: Vec<TimeRange>,
}

impl PlaybackPosition {
    pub fn new(current_time: f64, buffered: Vec<TimeRange>) -> Self {
        Self {
            current_time,
            buffered,
        }
    }

    /// Seconds of contiguous media ahead of the playhead, or 0 when the
    /// playhead sits outside every buffered range.
    pub fn buffer_ahead(&self) -> f64 {
        self.buffered
            .iter()
            .find(|r| r.contains(self.current_time))
            .map_or(0.0, |r| (r.end - self.current_time).max(0.0))
    }
}
