// ── Runtime configuration ──
//
// These types describe how to reach the video backend and how the network
// monitor behaves. They never touch disk: the CLI (via vidpulse-config)
// builds a `ClientConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;
use vidpulse_api::{TlsMode, TransportConfig, VideoApiClient};

use crate::error::CoreError;

/// Shortest period any monitor or session timer runs at.
pub const MIN_TIMER_PERIOD: Duration = Duration::from_millis(10);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (local development backends).
    DangerAcceptInvalid,
}

/// Tuning for sampling, probing, switching and session transport.
///
/// Durations are (de)serialized as integer milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkMonitoringConfig {
    pub enable_bandwidth_monitoring: bool,
    #[serde(with = "millis")]
    pub bandwidth_test_interval: Duration,

    pub enable_latency_monitoring: bool,
    #[serde(with = "millis")]
    pub latency_test_interval: Duration,

    pub enable_buffer_monitoring: bool,
    /// Also the metrics sampling tick.
    #[serde(with = "millis")]
    pub buffer_monitoring_interval: Duration,

    pub auto_quality_switching: bool,
    /// Fraction (0..=1) of the hysteresis window a new target must hold.
    pub quality_switch_threshold: f64,
    /// Minimum time between hysteresis-driven switches.
    #[serde(with = "millis")]
    pub switch_cooldown: Duration,

    /// Seconds of buffer the player aims to hold.
    pub buffer_target: f64,
    /// Seconds of buffer below which playback is at risk.
    pub buffer_minimum: f64,

    #[serde(with = "millis")]
    pub websocket_heartbeat_interval: Duration,
    #[serde(with = "millis")]
    pub status_report_interval: Duration,
    pub max_reconnect_attempts: u32,
    #[serde(with = "millis")]
    pub reconnect_delay: Duration,
}

impl Default for NetworkMonitoringConfig {
    fn default() -> Self {
        Self {
            enable_bandwidth_monitoring: true,
            bandwidth_test_interval: Duration::from_secs(30),
            enable_latency_monitoring: true,
            latency_test_interval: Duration::from_secs(10),
            enable_buffer_monitoring: true,
            buffer_monitoring_interval: Duration::from_secs(1),
            auto_quality_switching: true,
            quality_switch_threshold: 0.8,
            switch_cooldown: Duration::from_secs(10),
            buffer_target: 30.0,
            buffer_minimum: 5.0,
            websocket_heartbeat_interval: Duration::from_secs(30),
            status_report_interval: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(3000),
        }
    }
}

impl NetworkMonitoringConfig {
    /// Raise every timer period to at least [`MIN_TIMER_PERIOD`]. A zero
    /// heartbeat is left alone; the socket treats it as "off".
    pub fn with_minimum_periods(mut self) -> Self {
        for period in [
            &mut self.bandwidth_test_interval,
            &mut self.latency_test_interval,
            &mut self.buffer_monitoring_interval,
            &mut self.status_report_interval,
        ] {
            if *period < MIN_TIMER_PERIOD {
                tracing::warn!(?period, min = ?MIN_TIMER_PERIOD, "timer period too short, raising it");
                *period = MIN_TIMER_PERIOD;
            }
        }
        self
    }

    /// Reconnect policy for the dashboard feed.
    pub fn reconnect_config(&self) -> vidpulse_api::ReconnectConfig {
        vidpulse_api::ReconnectConfig {
            initial_delay: self.reconnect_delay,
            max_retries: Some(self.max_reconnect_attempts),
            ..vidpulse_api::ReconnectConfig::default()
        }
    }
}

/// Everything needed to talk to one backend.
///
/// Built by the CLI, passed to core -- core never reads config files.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (e.g., `https://learn.example.com`).
    pub api_url: Url,
    /// Bearer token, if the backend requires one.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    pub monitoring: NetworkMonitoringConfig,
}

impl ClientConfig {
    /// Transport settings for the HTTP client.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }

    /// Build the REST client for this backend.
    pub fn api_client(&self) -> Result<VideoApiClient, CoreError> {
        let client = VideoApiClient::new(self.api_url.clone(), self.token.as_ref(), &self.transport())?;
        Ok(client)
    }

    /// Dashboard feed endpoint: `ws(s)://<host>/ws/dashboard`.
    pub fn dashboard_url(&self) -> Result<Url, CoreError> {
        let mut url = self.api_url.join("/ws/dashboard").map_err(|e| CoreError::Config {
            message: format!("Invalid URL: {e}"),
        })?;
        let scheme = if self.api_url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| CoreError::Config {
            message: format!("cannot derive a WebSocket URL from {}", self.api_url),
        })?;
        Ok(url)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
