// ── Estimator ──
//
// Reduces the sampler's raw windows to smoothed metrics. Every function is
// pure over a `&MetricsSampler`; the monitor decides when to call them.

use crate::model::{HlsNetworkMetrics, PlaybackPosition};
use crate::sampler::MetricsSampler;

/// Bandwidth reported before any fragment has loaded (Mbps).
pub const FALLBACK_BANDWIDTH_MBPS: f64 = 1.0;
/// Latency reported before any probe has completed (ms).
pub const FALLBACK_LATENCY_MS: f64 = 100.0;

/// Number of recent fragments inspected for stability.
const STABILITY_WINDOW: usize = 5;
/// Variance-to-mean ratio above which bandwidth counts as unstable.
const INSTABILITY_THRESHOLD: f64 = 0.3;

/// Median per-fragment bandwidth over the window, in Mbps.
pub fn bandwidth(sampler: &MetricsSampler) -> f64 {
    let values: Vec<f64> = sampler
        .fragments()
        .iter()
        .filter_map(crate::sampler::FragmentSample::bandwidth_mbps)
        .collect();
    median(values).unwrap_or(FALLBACK_BANDWIDTH_MBPS)
}

/// Mean of the latency window, in ms.
pub fn latency(sampler: &MetricsSampler) -> f64 {
    mean(sampler.latencies().iter().copied()).unwrap_or(FALLBACK_LATENCY_MS)
}

/// Failed fraction of all fragment requests since the last reset.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn packet_loss(sampler: &MetricsSampler) -> f64 {
    let errors = sampler.loading_errors();
    let total = sampler.successful_fragments().saturating_add(errors);
    if total == 0 {
        return 0.0;
    }
    errors as f64 / total as f64
}

/// Seconds buffered ahead of the playhead; 0 without a player.
pub fn buffer_health(position: Option<&PlaybackPosition>) -> f64 {
    position.map_or(0.0, PlaybackPosition::buffer_ahead)
}

/// `true` when the last few fragments disagree too much to trust a
/// mid-band switch.
pub fn is_bandwidth_unstable(sampler: &MetricsSampler) -> bool {
    let recent: Vec<f64> = sampler
        .fragments()
        .latest(STABILITY_WINDOW)
        .filter_map(crate::sampler::FragmentSample::bandwidth_mbps)
        .collect();
    if recent.len() < 2 {
        return false;
    }
    let Some(avg) = mean(recent.iter().copied()) else {
        return false;
    };
    if avg <= 0.0 {
        return false;
    }
    let variance = mean(recent.iter().map(|v| (v - avg).powi(2))).unwrap_or(0.0);
    variance / avg > INSTABILITY_THRESHOLD
}

/// Fragment-level view of the windows.
pub fn hls_metrics(sampler: &MetricsSampler, position: Option<&PlaybackPosition>) -> HlsNetworkMetrics {
    let fragments = sampler.fragments();
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let fragment_size = mean(fragments.iter().map(|f| f.size_bytes as f64)).unwrap_or(0.0);
    let fragment_bandwidth = median(
        fragments
            .iter()
            .filter_map(crate::sampler::FragmentSample::bandwidth_mbps)
            .collect(),
    )
    .unwrap_or(0.0);

    HlsNetworkMetrics {
        fragment_load_time: mean(fragments.iter().map(|f| f.load_time_ms)).unwrap_or(0.0),
        fragment_size,
        fragment_bandwidth,
        ttfb: mean(fragments.iter().map(|f| f.ttfb_ms)).unwrap_or(0.0),
        buffer_level: buffer_health(position),
        dropped_frames: sampler.dropped_frames(),
        loading_errors: sampler.loading_errors(),
    }
}

// ── Statistics ───────────────────────────────────────────────────────

/// Arithmetic mean; `None` for no values.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Middle value; the average of the two middle values for even counts.
fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
