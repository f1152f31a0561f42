// ── Quality scorer ──
//
// Heuristic 1..=10 fitness score. Starts at 10 and subtracts a penalty for
// each signal independently; the result is clamped.

use crate::model::NetworkCondition;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Buffer (seconds) below which playback is considered at risk.
pub const LOW_BUFFER_SECS: f64 = 3.0;

/// The four signals the score is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub bandwidth_mbps: f64,
    pub latency_ms: f64,
    pub packet_loss: f64,
    pub buffer_health: f64,
}

fn bandwidth_penalty(mbps: f64) -> i32 {
    if mbps < 1.0 {
        4
    } else if mbps < 3.0 {
        2
    } else if mbps < 5.0 {
        1
    } else {
        0
    }
}

fn latency_penalty(ms: f64) -> i32 {
    if ms > 500.0 {
        3
    } else if ms > 200.0 {
        2
    } else if ms > 100.0 {
        1
    } else {
        0
    }
}

fn loss_penalty(loss: f64) -> i32 {
    if loss > 0.05 {
        2
    } else if loss > 0.01 {
        1
    } else {
        0
    }
}

fn buffer_penalty(secs: f64) -> i32 {
    i32::from(secs < LOW_BUFFER_SECS)
}

/// Score a reading. Always within `MIN_SCORE..=MAX_SCORE`.
pub fn score(reading: &Reading) -> u8 {
    let penalty = bandwidth_penalty(reading.bandwidth_mbps)
        + latency_penalty(reading.latency_ms)
        + loss_penalty(reading.packet_loss)
        + buffer_penalty(reading.buffer_health);
    let raw = i32::from(MAX_SCORE) - penalty;
    u8::try_from(raw.clamp(i32::from(MIN_SCORE), i32::from(MAX_SCORE))).unwrap_or(MIN_SCORE)
}

/// Bucket a score into a [`NetworkCondition`].
pub fn network_condition(score: u8) -> NetworkCondition {
    NetworkCondition::from_score(score)
}
