// ── Active network probes ──
//
// Latency and bandwidth probes against the backend. A failed probe is
// logged and degrades to a pessimistic sentinel instead of an error, so
// the monitor always has something to score. Probes are never retried;
// the next interval tick runs them again.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};
use vidpulse_api::{BandwidthSample, VideoApiClient};

use crate::sampler::FragmentSample;

/// Latency assumed when the ping probe fails (ms).
pub const LATENCY_SENTINEL_MS: f64 = 1000.0;
/// Bandwidth assumed when the download probe fails (Mbps).
pub const BANDWIDTH_SENTINEL_MBPS: f64 = 0.5;

/// Source of active measurements. Implemented by [`VideoApiClient`];
/// tests substitute scripted probers.
pub trait NetworkProbe: Send + Sync + 'static {
    fn ping(&self) -> impl Future<Output = Result<Duration, vidpulse_api::Error>> + Send;

    fn bandwidth_test(
        &self,
    ) -> impl Future<Output = Result<BandwidthSample, vidpulse_api::Error>> + Send;
}

impl NetworkProbe for VideoApiClient {
    fn ping(&self) -> impl Future<Output = Result<Duration, vidpulse_api::Error>> + Send {
        VideoApiClient::ping(self)
    }

    fn bandwidth_test(
        &self,
    ) -> impl Future<Output = Result<BandwidthSample, vidpulse_api::Error>> + Send {
        VideoApiClient::bandwidth_test(self)
    }
}

/// Outcome of one bandwidth probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthProbe {
    pub mbps: f64,
    /// The download as a fragment for the sampler. `None` when `mbps` is
    /// the sentinel: a failed test is not a fragment request.
    pub fragment: Option<FragmentSample>,
}

impl BandwidthProbe {
    pub fn measured(&self) -> bool {
        self.fragment.is_some()
    }
}

/// Round-trip time in ms, or [`LATENCY_SENTINEL_MS`] on failure.
pub async fn probe_latency<P: NetworkProbe>(prober: &P) -> f64 {
    match prober.ping().await {
        Ok(rtt) => {
            let ms = rtt.as_secs_f64() * 1000.0;
            debug!(latency_ms = ms, "latency probe");
            ms
        }
        Err(e) => {
            warn!(error = %e, "latency probe failed, assuming {LATENCY_SENTINEL_MS} ms");
            LATENCY_SENTINEL_MS
        }
    }
}

/// Download throughput in Mbps, or [`BANDWIDTH_SENTINEL_MBPS`] on failure.
pub async fn probe_bandwidth<P: NetworkProbe>(prober: &P) -> BandwidthProbe {
    match prober.bandwidth_test().await {
        Ok(sample) if !sample.elapsed.is_zero() => {
            let fragment = FragmentSample::new(sample.elapsed.as_secs_f64() * 1000.0, sample.bytes);
            let mbps = fragment.bandwidth_mbps().unwrap_or(BANDWIDTH_SENTINEL_MBPS);
            debug!(bytes = sample.bytes, mbps, "bandwidth probe");
            BandwidthProbe {
                mbps,
                fragment: Some(fragment),
            }
        }
        Ok(_) => {
            warn!("bandwidth probe completed in zero time, ignoring measurement");
            sentinel_bandwidth()
        }
        Err(e) => {
            warn!(error = %e, "bandwidth probe failed, assuming {BANDWIDTH_SENTINEL_MBPS} Mbps");
            sentinel_bandwidth()
        }
    }
}

fn sentinel_bandwidth() -> BandwidthProbe {
    BandwidthProbe {
        mbps: BANDWIDTH_SENTINEL_MBPS,
        fragment: None,
    }
}
