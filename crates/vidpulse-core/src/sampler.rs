// ── Metrics sampler ──
//
// Bounded sliding windows of raw observations from the media client.
// Owned by exactly one task (the monitor); no interior mutability.

use std::collections::VecDeque;

/// Capacity of every sliding window.
pub const WINDOW_CAPACITY: usize = 20;

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1_048_576.0;

/// A fixed-capacity FIFO that evicts its oldest entry on overflow.
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> SlidingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, dropping the oldest entry if the window is full.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The most recent `n` entries, oldest first.
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }
}

/// One completed media-fragment download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentSample {
    pub load_time_ms: f64,
    pub size_bytes: u64,
    /// Time to first byte, if the media client reports it.
    pub ttfb_ms: f64,
}

impl FragmentSample {
    pub fn new(load_time_ms: f64, size_bytes: u64) -> Self {
        Self {
            load_time_ms,
            size_bytes,
            ttfb_ms: 0.0,
        }
    }

    /// Throughput of this fragment in Mbps (2^20 bits), `None` for
    /// zero-duration loads.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn bandwidth_mbps(&self) -> Option<f64> {
        if self.load_time_ms.is_nan() || self.load_time_ms <= 0.0 {
            return None;
        }
        let seconds = self.load_time_ms / 1000.0;
        Some(self.size_bytes as f64 * BITS_PER_BYTE / seconds / BITS_PER_MEGABIT)
    }
}

/// Raw signal store for one playback.
#[derive(Debug, Clone)]
pub struct MetricsSampler {
    fragments: SlidingWindow<FragmentSample>,
    latencies: SlidingWindow<f64>,
    successful_fragments: u64,
    loading_errors: u64,
    dropped_frames: u64,
}

impl Default for MetricsSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSampler {
    pub fn new() -> Self {
        Self {
            fragments: SlidingWindow::new(WINDOW_CAPACITY),
            latencies: SlidingWindow::new(WINDOW_CAPACITY),
            successful_fragments: 0,
            loading_errors: 0,
            dropped_frames: 0,
        }
    }

    pub fn record_fragment(&mut self, sample: FragmentSample) {
        self.fragments.push(sample);
        self.successful_fragments += 1;
    }

    pub fn record_error(&mut self) {
        self.loading_errors += 1;
    }

    pub fn record_latency(&mut self, latency_ms: f64) {
        if latency_ms.is_finite() && latency_ms >= 0.0 {
            self.latencies.push(latency_ms);
        }
    }

    /// Store the player's cumulative dropped-frame counter.
    pub fn record_dropped_frames(&mut self, total: u64) {
        self.dropped_frames = total;
    }

    pub fn reset(&mut self) {
        self.fragments.clear();
        self.latencies.clear();
        self.successful_fragments = 0;
        self.loading_errors = 0;
        self.dropped_frames = 0;
    }

    pub fn fragments(&self) -> &SlidingWindow<FragmentSample> {
        &self.fragments
    }

    pub fn latencies(&self) -> &SlidingWindow<f64> {
        &self.latencies
    }

    /// Successful fragment loads since the last reset (not window-bounded).
    pub fn successful_fragments(&self) -> u64 {
        self.successful_fragments
    }

    pub fn loading_errors(&self) -> u64 {
        self.loading_errors
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_most_recent_twenty() {
        let mut sampler = MetricsSampler::new();
        for i in 0..25_u64 {
            sampler.record_fragment(FragmentSample::new(100.0, i));
        }

        let sizes: Vec<u64> = sampler.fragments().iter().map(|f| f.size_bytes).collect();
        assert_eq!(sizes.len(), WINDOW_CAPACITY);
        assert_eq!(sizes, (5..25).collect::<Vec<_>>());
        assert_eq!(sampler.successful_fragments(), 25);
    }

    #[test]
    fn latest_returns_tail_in_order() {
        let mut window = SlidingWindow::new(4);
        for i in 1..=6 {
            window.push(i);
        }
        assert_eq!(window.latest(2).copied().collect::<Vec<_>>(), vec![5, 6]);
        assert_eq!(window.latest(10).copied().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn fragment_bandwidth_in_mbps() {
        // 1 MiB in one second is 8 Mbps.
        let sample = FragmentSample::new(1000.0, 1_048_576);
        assert_eq!(sample.bandwidth_mbps(), Some(8.0));
        assert_eq!(FragmentSample::new(0.0, 1024).bandwidth_mbps(), None);
    }

    #[test]
    fn reset_clears_everything() {
        let mut sampler = MetricsSampler::new();
        sampler.record_fragment(FragmentSample::new(50.0, 1000));
        sampler.record_error();
        sampler.record_latency(40.0);
        sampler.record_dropped_frames(3);
        sampler.reset();

        assert!(sampler.fragments().is_empty());
        assert!(sampler.latencies().is_empty());
        assert_eq!(sampler.loading_errors(), 0);
        assert_eq!(sampler.successful_fragments(), 0);
        assert_eq!(sampler.dropped_frames(), 0);
    }

    #[test]
    fn invalid_latency_is_ignored() {
        let mut sampler = MetricsSampler::new();
        sampler.record_latency(f64::NAN);
        sampler.record_latency(-5.0);
        assert!(sampler.latencies().is_empty());
    }
}
