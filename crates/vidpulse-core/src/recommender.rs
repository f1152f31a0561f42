// ── Quality recommender ──
//
// Maps a score to a resolution and decides whether to act on it. Decisions
// at the extremes are immediate; in the uncertain middle band a target has
// to hold for several consecutive evaluations (and outside a cooldown)
// before the switcher commits to it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::time::Instant;

use crate::model::VideoQuality;
use crate::scorer::LOW_BUFFER_SECS;

/// Quality used when nothing at or below the mapped quality is available.
pub const DEFAULT_QUALITY: VideoQuality = VideoQuality::P360;

/// Evaluations the hysteresis threshold is a fraction of.
const HYSTERESIS_WINDOW: f64 = 5.0;

/// Score at or below which a downgrade is applied immediately.
const CRITICAL_SCORE: u8 = 2;
/// Score at or above which an upgrade is applied immediately.
const CONFIDENT_SCORE: u8 = 8;

/// The resolution a score maps to, ignoring availability.
pub fn quality_for_score(score: u8) -> VideoQuality {
    match score {
        0..=2 => VideoQuality::P240,
        3..=4 => VideoQuality::P360,
        5..=6 => VideoQuality::P480,
        7..=8 => VideoQuality::P720,
        _ => VideoQuality::P1080,
    }
}

/// Best available quality for a score.
///
/// Returns the mapped quality if offered, else the highest offered quality
/// below it, else [`DEFAULT_QUALITY`].
pub fn recommend(score: u8, available: &[VideoQuality]) -> VideoQuality {
    let target = quality_for_score(score);
    if available.contains(&target) {
        return target;
    }
    available
        .iter()
        .copied()
        .filter(|q| *q < target)
        .max()
        .unwrap_or(DEFAULT_QUALITY)
}

/// Signals consulted when deciding whether to act on a recommendation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchContext {
    pub score: u8,
    pub buffer_health: f64,
    pub bandwidth_unstable: bool,
}

/// Why a switch was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SwitchReason {
    /// Score at or below the critical floor.
    CriticalNetwork,
    /// Score at or above the confident ceiling.
    ConfidentNetwork,
    /// Buffer about to run dry.
    LowBuffer,
    /// Target held across the hysteresis window.
    Sustained,
}

/// A committed switch, as broadcast by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityDecision {
    pub from: VideoQuality,
    pub to: VideoQuality,
    pub reason: SwitchReason,
}

/// Stateful anti-oscillation policy.
///
/// One instance per monitored playback. Time is passed in so the policy
/// stays deterministic under test.
#[derive(Debug, Clone)]
pub struct QualitySwitcher {
    required: u32,
    cooldown: Duration,
    pending: Option<(VideoQuality, u32)>,
    last_switch: Option<Instant>,
}

impl QualitySwitcher {
    /// `threshold` is the fraction of a five-evaluation window a target must
    /// hold; 0.8 means four consecutive evaluations.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::as_conversions
    )]
    pub fn new(threshold: f64, cooldown: Duration) -> Self {
        let required = (threshold.clamp(0.0, 1.0) * HYSTERESIS_WINDOW).ceil().max(1.0) as u32;
        Self {
            required,
            cooldown,
            pending: None,
            last_switch: None,
        }
    }

    /// Consecutive evaluations a mid-band target must hold.
    pub fn required_evaluations(&self) -> u32 {
        self.required
    }

    /// Evaluate one recommendation and return the reason to switch, if any.
    /// Committing a switch starts the cooldown.
    pub fn decide(
        &mut self,
        current: VideoQuality,
        recommended: VideoQuality,
        ctx: &SwitchContext,
        now: Instant,
    ) -> Option<SwitchReason> {
        if current == recommended {
            self.pending = None;
            return None;
        }

        let reason = if ctx.score <= CRITICAL_SCORE {
            Some(SwitchReason::CriticalNetwork)
        } else if ctx.score >= CONFIDENT_SCORE {
            Some(SwitchReason::ConfidentNetwork)
        } else if ctx.buffer_health < LOW_BUFFER_SECS {
            Some(SwitchReason::LowBuffer)
        } else if ctx.bandwidth_unstable {
            self.pending = None;
            None
        } else {
            self.hysteresis(recommended, now)
        };

        if reason.is_some() {
            self.pending = None;
            self.last_switch = Some(now);
        }
        reason
    }

    /// Boolean form of [`decide`](Self::decide).
    pub fn should_switch(
        &mut self,
        current: VideoQuality,
        recommended: VideoQuality,
        ctx: &SwitchContext,
        now: Instant,
    ) -> bool {
        self.decide(current, recommended, ctx, now).is_some()
    }

    fn hysteresis(&mut self, recommended: VideoQuality, now: Instant) -> Option<SwitchReason> {
        let count = match self.pending {
            Some((target, n)) if target == recommended => n + 1,
            _ => 1,
        };
        self.pending = Some((recommended, count));

        let cooled = self
            .last_switch
            .is_none_or(|at| now.duration_since(at) >= self.cooldown);
        (count >= self.required && cooled).then_some(SwitchReason::Sustained)
    }
}
