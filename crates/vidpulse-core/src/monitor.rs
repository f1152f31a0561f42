// ── Network monitor ──
//
// A single task owns the sampler and the switcher. Everything else talks to
// it through channels: raw observations arrive on an mpsc queue and are
// applied in order, metrics leave on a `watch`, switch decisions on a
// `broadcast`. Probe tasks feed their results back through the same queue.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use strum::IntoEnumIterator;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::NetworkMonitoringConfig;
use crate::error::CoreError;
use crate::estimator;
use crate::model::{
    ConnectionType, HlsNetworkMetrics, NetworkMetrics, PlaybackPosition, VideoQuality,
};
use crate::probe::{self, NetworkProbe};
use crate::recommender::{self, QualityDecision, QualitySwitcher, SwitchContext};
use crate::sampler::{FragmentSample, MetricsSampler};
use crate::scorer::{self, Reading};
use crate::stream::MetricsStream;

const INPUT_CHANNEL_SIZE: usize = 256;
const DECISION_CHANNEL_SIZE: usize = 32;

// ── Inputs ───────────────────────────────────────────────────────────

/// An observation reported by the embedding media client.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorInput {
    FragmentLoaded(FragmentSample),
    LoadingError,
    LatencySample(f64),
    /// The bandwidth test failed. The sentinel stands in for the estimate
    /// until a real fragment arrives; the sampler's counters are untouched.
    BandwidthProbeFailed,
    /// Cumulative dropped-frame counter from the player.
    DroppedFrames(u64),
    Position(PlaybackPosition),
    ConnectionType(ConnectionType),
    /// The quality the player is currently rendering.
    CurrentQuality(VideoQuality),
    /// Renditions the current video offers.
    AvailableQualities(Vec<VideoQuality>),
    /// Drop all samples and counters.
    Reset,
}

enum MonitorRequest {
    Input(MonitorInput),
    HlsMetrics(oneshot::Sender<HlsNetworkMetrics>),
}

// ── QualityMonitor ───────────────────────────────────────────────────

/// Synchronous monitor state: apply inputs, then `tick` to get metrics and
/// an optional switch decision.
///
/// [`NetworkMonitor`] drives one of these from its task; it is usable on
/// its own wherever a runtime is unwanted.
#[derive(Debug, Clone)]
pub struct QualityMonitor {
    config: NetworkMonitoringConfig,
    sampler: MetricsSampler,
    switcher: QualitySwitcher,
    position: Option<PlaybackPosition>,
    connection_type: ConnectionType,
    current: Option<VideoQuality>,
    available: Vec<VideoQuality>,
    assumed_bandwidth: Option<f64>,
}

impl QualityMonitor {
    pub fn new(config: NetworkMonitoringConfig) -> Self {
        let switcher = QualitySwitcher::new(config.quality_switch_threshold, config.switch_cooldown);
        Self {
            config,
            sampler: MetricsSampler::new(),
            switcher,
            position: None,
            connection_type: ConnectionType::default(),
            current: None,
            available: Vec::new(),
            assumed_bandwidth: None,
        }
    }

    pub fn apply(&mut self, input: MonitorInput) {
        match input {
            MonitorInput::FragmentLoaded(sample) => {
                self.assumed_bandwidth = None;
                self.sampler.record_fragment(sample);
            }
            MonitorInput::LoadingError => self.sampler.record_error(),
            MonitorInput::LatencySample(ms) => self.sampler.record_latency(ms),
            MonitorInput::BandwidthProbeFailed => {
                self.assumed_bandwidth = Some(probe::BANDWIDTH_SENTINEL_MBPS);
            }
            MonitorInput::DroppedFrames(n) => self.sampler.record_dropped_frames(n),
            MonitorInput::Position(position) => self.position = Some(position),
            MonitorInput::ConnectionType(kind) => self.connection_type = kind,
            MonitorInput::CurrentQuality(quality) => self.current = Some(quality),
            MonitorInput::AvailableQualities(mut qualities) => {
                qualities.sort_unstable();
                qualities.dedup();
                self.available = qualities;
            }
            MonitorInput::Reset => {
                self.sampler.reset();
                self.position = None;
                self.assumed_bandwidth = None;
            }
        }
    }

    pub fn current_quality(&self) -> Option<VideoQuality> {
        self.current
    }

    /// Qualities the recommender may choose from. All of them until the
    /// player reports its renditions.
    pub fn available_qualities(&self) -> Vec<VideoQuality> {
        if self.available.is_empty() {
            VideoQuality::iter().collect()
        } else {
            self.available.clone()
        }
    }

    fn buffer_health(&self) -> f64 {
        if self.config.enable_buffer_monitoring {
            estimator::buffer_health(self.position.as_ref())
        } else {
            self.config.buffer_target
        }
    }

    /// Recompute metrics from the current windows.
    pub fn metrics(&self, timestamp: DateTime<Utc>) -> NetworkMetrics {
        let reading = Reading {
            bandwidth_mbps: self
                .assumed_bandwidth
                .unwrap_or_else(|| estimator::bandwidth(&self.sampler)),
            latency_ms: estimator::latency(&self.sampler),
            packet_loss: estimator::packet_loss(&self.sampler),
            buffer_health: self.buffer_health(),
        };
        NetworkMetrics {
            bandwidth_mbps: reading.bandwidth_mbps,
            latency_ms: reading.latency_ms,
            packet_loss: reading.packet_loss,
            connection_type: self.connection_type,
            quality_score: scorer::score(&reading),
            buffer_health: reading.buffer_health,
            timestamp,
        }
    }

    pub fn hls_metrics(&self) -> HlsNetworkMetrics {
        let mut hls = estimator::hls_metrics(&self.sampler, self.position.as_ref());
        hls.buffer_level = self.buffer_health();
        hls
    }

    /// Run the switching policy against `metrics`.
    ///
    /// A committed decision is assumed to be carried out by the player, so
    /// the current quality moves to the target immediately.
    pub fn evaluate(&mut self, metrics: &NetworkMetrics, now: Instant) -> Option<QualityDecision> {
        if !self.config.auto_quality_switching {
            return None;
        }
        let current = self.current?;
        let recommended = recommender::recommend(metrics.quality_score, &self.available_qualities());
        let ctx = SwitchContext {
            score: metrics.quality_score,
            buffer_health: metrics.buffer_health,
            bandwidth_unstable: estimator::is_bandwidth_unstable(&self.sampler),
        };

        let reason = self.switcher.decide(current, recommended, &ctx, now)?;
        self.current = Some(recommended);
        Some(QualityDecision {
            from: current,
            to: recommended,
            reason,
        })
    }

    /// One sampling tick: fresh metrics plus any switch decision.
    pub fn tick(&mut self, now: Instant) -> (NetworkMetrics, Option<QualityDecision>) {
        let metrics = self.metrics(Utc::now());
        let decision = self.evaluate(&metrics, now);
        (metrics, decision)
    }
}

// ── NetworkMonitor ───────────────────────────────────────────────────

/// Handle to a running monitor task.
///
/// Cheaply cloneable; all clones talk to the same task. Constructed
/// explicitly and passed where needed.
#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: NetworkMonitoringConfig,
    request_tx: mpsc::Sender<MonitorRequest>,
    metrics: watch::Receiver<Arc<NetworkMetrics>>,
    decision_tx: broadcast::Sender<QualityDecision>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl NetworkMonitor {
    /// Start a passive monitor: metrics come only from reported inputs.
    pub fn spawn(config: NetworkMonitoringConfig, cancel: CancellationToken) -> Self {
        Self::start(config, cancel)
    }

    /// Start a monitor that also runs the enabled latency and bandwidth
    /// probes on their own intervals.
    pub fn spawn_with_prober<P: NetworkProbe>(
        config: NetworkMonitoringConfig,
        prober: Arc<P>,
        cancel: CancellationToken,
    ) -> Self {
        let monitor = Self::start(config, cancel);
        let inner = &monitor.inner;
        let mut handles = Vec::new();

        if inner.config.enable_latency_monitoring {
            handles.push(tokio::spawn(latency_probe_task(
                Arc::clone(&prober),
                inner.request_tx.clone(),
                inner.config.latency_test_interval,
                inner.cancel.clone(),
            )));
        }
        if inner.config.enable_bandwidth_monitoring {
            handles.push(tokio::spawn(bandwidth_probe_task(
                prober,
                inner.request_tx.clone(),
                inner.config.bandwidth_test_interval,
                inner.cancel.clone(),
            )));
        }

        monitor.adopt(handles);
        monitor
    }

    fn start(
        config: NetworkMonitoringConfig,
        cancel: CancellationToken,
    ) -> Self {
        let config = config.with_minimum_periods();
        let state = QualityMonitor::new(config.clone());
        let (metrics_tx, metrics) = watch::channel(Arc::new(state.metrics(Utc::now())));
        let (decision_tx, _) = broadcast::channel(DECISION_CHANNEL_SIZE);
        let (request_tx, request_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);

        info!(
            tick = ?config.buffer_monitoring_interval,
            auto_switching = config.auto_quality_switching,
            "starting network monitor"
        );

        let handle = tokio::spawn(monitor_task(
            state,
            request_rx,
            metrics_tx,
            decision_tx.clone(),
            config.buffer_monitoring_interval,
            cancel.clone(),
        ));

        Self {
            inner: Arc::new(MonitorInner {
                config,
                request_tx,
                metrics,
                decision_tx,
                cancel,
                task_handles: Mutex::new(vec![handle]),
            }),
        }
    }

    fn adopt(&self, handles: Vec<JoinHandle<()>>) {
        self.inner
            .task_handles
            .lock()
            .expect("monitor task list lock poisoned")
            .extend(handles);
    }

    pub fn config(&self) -> &NetworkMonitoringConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled() && !self.inner.request_tx.is_closed()
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Queue an observation. Applied in send order.
    pub async fn send(&self, input: MonitorInput) -> Result<(), CoreError> {
        self.inner
            .request_tx
            .send(MonitorRequest::Input(input))
            .await
            .map_err(|_| CoreError::MonitorStopped)
    }

    pub async fn record_fragment(
        &self,
        load_time_ms: f64,
        size_bytes: u64,
        ttfb_ms: f64,
    ) -> Result<(), CoreError> {
        self.send(MonitorInput::FragmentLoaded(FragmentSample {
            load_time_ms,
            size_bytes,
            ttfb_ms,
        }))
        .await
    }

    pub async fn record_error(&self) -> Result<(), CoreError> {
        self.send(MonitorInput::LoadingError).await
    }

    pub async fn set_current_quality(&self, quality: VideoQuality) -> Result<(), CoreError> {
        self.send(MonitorInput::CurrentQuality(quality)).await
    }

    // ── Outputs ──────────────────────────────────────────────────────

    /// Metrics from the most recent tick.
    pub fn snapshot(&self) -> Arc<NetworkMetrics> {
        self.inner.metrics.borrow().clone()
    }

    /// Subscribe to per-tick metrics.
    pub fn metrics(&self) -> MetricsStream {
        MetricsStream::new(self.inner.metrics.clone())
    }

    /// Subscribe to committed quality switches.
    pub fn decisions(&self) -> broadcast::Receiver<QualityDecision> {
        self.inner.decision_tx.subscribe()
    }

    /// Fragment-level metrics, computed by the monitor task after every
    /// input queued before this call.
    pub async fn hls_metrics(&self) -> Result<HlsNetworkMetrics, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .request_tx
            .send(MonitorRequest::HlsMetrics(tx))
            .await
            .map_err(|_| CoreError::MonitorStopped)?;
        rx.await.map_err(|_| CoreError::MonitorStopped)
    }

    /// Stop the monitor and its probes, waiting for the tasks to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self
            .inner
            .task_handles
            .lock()
            .expect("monitor task list lock poisoned")
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
        debug!("network monitor stopped");
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn monitor_task(
    mut state: QualityMonitor,
    mut rx: mpsc::Receiver<MonitorRequest>,
    metrics_tx: watch::Sender<Arc<NetworkMetrics>>,
    decision_tx: broadcast::Sender<QualityDecision>,
    tick_every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick_every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            request = rx.recv() => {
                let Some(request) = request else { break };
                match request {
                    MonitorRequest::Input(input) => {
                        trace!(?input, "monitor input");
                        state.apply(input);
                    }
                    MonitorRequest::HlsMetrics(reply) => {
                        let _ = reply.send(state.hls_metrics());
                    }
                }
            }
            _ = interval.tick() => {
                let (metrics, decision) = state.tick(Instant::now());
                debug!(
                    score = metrics.quality_score,
                    bandwidth_mbps = metrics.bandwidth_mbps,
                    latency_ms = metrics.latency_ms,
                    packet_loss = metrics.packet_loss,
                    buffer = metrics.buffer_health,
                    "metrics tick"
                );
                let _ = metrics_tx.send(Arc::new(metrics));

                if let Some(decision) = decision {
                    info!(
                        from = %decision.from,
                        to = %decision.to,
                        reason = %decision.reason,
                        "quality switch"
                    );
                    // No subscribers is fine.
                    let _ = decision_tx.send(decision);
                }
            }
        }
    }
}

async fn latency_probe_task<P: NetworkProbe>(
    prober: Arc<P>,
    tx: mpsc::Sender<MonitorRequest>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ms = tokio::select! {
                    () = cancel.cancelled() => break,
                    ms = probe::probe_latency(prober.as_ref()) => ms,
                };
                if tx.send(MonitorRequest::Input(MonitorInput::LatencySample(ms))).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn bandwidth_probe_task<P: NetworkProbe>(
    prober: Arc<P>,
    tx: mpsc::Sender<MonitorRequest>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let result = tokio::select! {
                    () = cancel.cancelled() => break,
                    result = probe::probe_bandwidth(prober.as_ref()) => result,
                };
                let input = match result.fragment {
                    Some(fragment) => MonitorInput::FragmentLoaded(fragment),
                    None => MonitorInput::BandwidthProbeFailed,
                };
                if tx.send(MonitorRequest::Input(input)).await.is_err() {
                    break;
                }
            }
        }
    }
}
