// ── Domain model ──
//
// Types the monitor reasons about. Wire types live in `vidpulse_api::models`;
// `crate::convert` translates between the two.

pub mod buffer;
pub mod metrics;
pub mod quality;
pub mod session;

pub use buffer::{PlaybackPosition, TimeRange};
pub use metrics::{ConnectionType, HlsNetworkMetrics, NetworkCondition, NetworkMetrics};
pub use quality::VideoQuality;
pub use session::Session;
