// ── Playback state machine ──
//
// Playback state is never mutated in place. Every change is an event
// appended to an ordered log; the state is the fold of that log through a
// pure reducer, so replaying the log from the start always reproduces the
// live state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{NetworkCondition, VideoQuality};

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEventKind {
    QualityChanged {
        from: Option<VideoQuality>,
        to: VideoQuality,
        reason: String,
    },
    /// Server-side recommendation. `quality` is `None` when the label is
    /// not one the recommender understands.
    RecommendationReceived {
        label: String,
        quality: Option<VideoQuality>,
        reason: Option<String>,
    },
    PreloadRequested {
        segments: Vec<String>,
        quality: Option<String>,
    },
    ProgressUpdated {
        position: f64,
        duration: f64,
    },
    MetricsUpdated {
        quality_score: u8,
        bandwidth_mbps: f64,
        buffer_health: f64,
    },
    SocketClosed {
        code: Option<u16>,
        reason: String,
    },
    SessionExpired,
}

/// A sequenced, timestamped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub sequence: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: PlaybackEventKind,
}

/// State derived from the event log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_quality: Option<VideoQuality>,
    pub quality_changes: u32,
    pub last_recommendation: Option<VideoQuality>,
    pub preload_segments: Vec<String>,
    pub position: f64,
    pub duration: f64,
    pub quality_score: Option<u8>,
    pub condition: Option<NetworkCondition>,
    pub socket_closed: Option<String>,
    pub expired: bool,
    pub last_sequence: Option<u64>,
}

impl PlaybackState {
    /// Fold one event into a new state.
    pub fn apply(&self, event: &PlaybackEvent) -> Self {
        let mut next = self.clone();
        next.last_sequence = Some(event.sequence);

        match &event.kind {
            PlaybackEventKind::QualityChanged { to, .. } => {
                if next.current_quality != Some(*to) {
                    next.quality_changes += 1;
                }
                next.current_quality = Some(*to);
            }
            PlaybackEventKind::RecommendationReceived { quality, .. } => {
                if quality.is_some() {
                    next.last_recommendation = *quality;
                }
            }
            PlaybackEventKind::PreloadRequested { segments, .. } => {
                next.preload_segments.clone_from(segments);
            }
            PlaybackEventKind::ProgressUpdated { position, duration } => {
                next.position = *position;
                next.duration = *duration;
            }
            PlaybackEventKind::MetricsUpdated { quality_score, .. } => {
                next.quality_score = Some(*quality_score);
                next.condition = Some(NetworkCondition::from_score(*quality_score));
            }
            PlaybackEventKind::SocketClosed { code, reason } => {
                next.socket_closed = Some(match code {
                    Some(code) => format!("{code}: {reason}"),
                    None => reason.clone(),
                });
            }
            PlaybackEventKind::SessionExpired => next.expired = true,
        }
        next
    }

    /// Fraction of the video watched, 0 when the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Append-only event log with its folded state.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<PlaybackEvent>,
    state: PlaybackState,
    next_sequence: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `kind` with the next sequence number and fold it in.
    pub fn append(&mut self, kind: PlaybackEventKind, at: DateTime<Utc>) -> &PlaybackEvent {
        let event = PlaybackEvent {
            sequence: self.next_sequence,
            at,
            kind,
        };
        self.next_sequence += 1;
        self.state = self.state.apply(&event);
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn events(&self) -> &[PlaybackEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Rebuild the state from scratch.
    pub fn replay(&self) -> PlaybackState {
        self.events
            .iter()
            .fold(PlaybackState::default(), |state, event| state.apply(event))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_log() -> EventLog {
        let now = Utc::now();
        let mut log = EventLog::new();
        log.append(
            PlaybackEventKind::QualityChanged {
                from: None,
                to: VideoQuality::P720,
                reason: "initial".into(),
            },
            now,
        );
        log.append(
            PlaybackEventKind::MetricsUpdated {
                quality_score: 4,
                bandwidth_mbps: 2.5,
                buffer_health: 6.0,
            },
            now,
        );
        log.append(
            PlaybackEventKind::RecommendationReceived {
                label: "480p".into(),
                quality: Some(VideoQuality::P480),
                reason: Some("congestion".into()),
            },
            now,
        );
        log.append(
            PlaybackEventKind::QualityChanged {
                from: Some(VideoQuality::P720),
                to: VideoQuality::P480,
                reason: "sustained".into(),
            },
            now,
        );
        log.append(
            PlaybackEventKind::PreloadRequested {
                segments: vec!["seg-12.ts".into(), "seg-13.ts".into()],
                quality: Some("480p".into()),
            },
            now,
        );
        log.append(
            PlaybackEventKind::ProgressUpdated {
                position: 30.0,
                duration: 120.0,
            },
            now,
        );
        log
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let log = sample_log();
        let seqs: Vec<u64> = log.events().iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, (0..6).collect::<Vec<_>>());
        assert_eq!(log.state().last_sequence, Some(5));
    }

    #[test]
    fn replay_matches_live_state() {
        let log = sample_log();
        assert_eq!(log.replay(), *log.state());
    }

    #[test]
    fn folded_state() {
        let state = sample_log().state().clone();
        assert_eq!(state.current_quality, Some(VideoQuality::P480));
        assert_eq!(state.quality_changes, 2);
        assert_eq!(state.last_recommendation, Some(VideoQuality::P480));
        assert_eq!(state.condition, Some(NetworkCondition::Poor));
        assert_eq!(state.preload_segments.len(), 2);
        assert!((state.progress() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn apply_does_not_mutate_input() {
        let before = PlaybackState::default();
        let event = PlaybackEvent {
            sequence: 0,
            at: Utc::now(),
            kind: PlaybackEventKind::SessionExpired,
        };
        let after = before.apply(&event);
        assert!(!before.expired);
        assert!(after.expired);
    }

    #[test]
    fn unknown_recommendation_keeps_previous() {
        let mut log = sample_log();
        log.append(
            PlaybackEventKind::RecommendationReceived {
                label: "4k".into(),
                quality: None,
                reason: None,
            },
            Utc::now(),
        );
        assert_eq!(log.state().last_recommendation, Some(VideoQuality::P480));
    }

    #[test]
    fn socket_close_is_recorded() {
        let mut log = EventLog::new();
        log.append(
            PlaybackEventKind::SocketClosed {
                code: Some(1001),
                reason: "going away".into(),
            },
            Utc::now(),
        );
        assert_eq!(log.state().socket_closed.as_deref(), Some("1001: going away"));
    }

    #[test]
    fn events_serialize_flat_with_type_tag() {
        let log = sample_log();
        let value = serde_json::to_value(&log.events()[5]).unwrap();
        assert_eq!(value["type"], "progress_updated");
        assert_eq!(value["sequence"], 5);
        assert_eq!(value["position"], 30.0);
    }
}
