// vidpulse-api: Async Rust client for the video backend (REST + session WebSocket)

pub mod client;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::VideoApiClient;
pub use dashboard::{DashboardEvent, DashboardFeed, FeedState, ReconnectConfig};
pub use error::Error;
pub use models::{
    BandwidthSample, NetworkReport, SessionInfo, VideoAnalytics, VideoInfo, VideoQualityInfo,
};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    InboundMessage, OutboundKind, OutboundMessage, PreloadHint, QualityRecommendation,
    SessionSocket, SocketEvent,
};
