// vidpulse-core: Network-quality estimation, scoring and adaptive quality
// recommendation for video playback.

pub mod config;
pub mod convert;
pub mod error;
pub mod estimator;
pub mod model;
pub mod monitor;
pub mod playback;
pub mod probe;
pub mod recommender;
pub mod sampler;
pub mod scorer;
pub mod session;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ClientConfig, NetworkMonitoringConfig, TlsVerification};
pub use error::CoreError;
pub use monitor::{MonitorInput, NetworkMonitor, QualityMonitor};
pub use playback::{EventLog, PlaybackEvent, PlaybackEventKind, PlaybackState};
pub use probe::NetworkProbe;
pub use recommender::{QualityDecision, QualitySwitcher, SwitchContext, SwitchReason, recommend};
pub use sampler::{FragmentSample, MetricsSampler};
pub use scorer::{Reading, network_condition, score};
pub use session::PlaybackSession;
pub use stream::MetricsStream;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ConnectionType, HlsNetworkMetrics, NetworkCondition, NetworkMetrics, PlaybackPosition,
    Session, TimeRange, VideoQuality,
};
