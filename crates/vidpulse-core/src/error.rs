// ── Core error types ──
//
// Errors surfaced by vidpulse-core. Consumers never see HTTP status codes
// or JSON parse failures directly; the `From<vidpulse_api::Error>` impl
// translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach video backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Session socket closed: {reason}")]
    SocketClosed { reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Video not found: {video_id}")]
    VideoNotFound { video_id: String },

    #[error("Session expired: {session_id}")]
    SessionExpired { session_id: String },

    // ── Monitor errors ───────────────────────────────────────────────
    #[error("Network monitor is not running")]
    MonitorStopped,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vidpulse_api::Error> for CoreError {
    fn from(err: vidpulse_api::Error) -> Self {
        match err {
            vidpulse_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            vidpulse_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            vidpulse_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            vidpulse_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            vidpulse_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            vidpulse_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            vidpulse_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            vidpulse_api::Error::WebSocketClosed { code, reason } => CoreError::SocketClosed {
                reason: format!("code {code}: {reason}"),
            },
            vidpulse_api::Error::SocketClosed { session_id } => CoreError::SocketClosed {
                reason: format!("session {session_id}"),
            },
            vidpulse_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

impl CoreError {
    /// Like `From`, but turns a 404 into [`CoreError::VideoNotFound`].
    pub fn for_video(err: vidpulse_api::Error, video_id: &str) -> Self {
        if err.is_not_found() {
            CoreError::VideoNotFound {
                video_id: video_id.to_owned(),
            }
        } else {
            err.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_404_becomes_video_not_found() {
        let err = CoreError::for_video(
            vidpulse_api::Error::Api {
                status: 404,
                message: "missing".into(),
            },
            "v-7",
        );
        assert!(matches!(err, CoreError::VideoNotFound { ref video_id } if video_id == "v-7"));
    }

    #[test]
    fn auth_errors_map_through() {
        let err: CoreError = vidpulse_api::Error::Authentication {
            message: "bad token".into(),
        }
        .into();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }
}
