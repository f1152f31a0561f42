//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use vidpulse_config::ConfigError;
use vidpulse_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to video backend at {url}")]
    #[diagnostic(
        code(vidpulse::connection_failed),
        help(
            "Check that the backend is running and reachable.\n\
             Try: vidpulse probe --api-url {url}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Session socket closed: {reason}")]
    #[diagnostic(
        code(vidpulse::socket_closed),
        help("Status reports fall back to REST; progress and quality changes are recorded locally.")
    )]
    SocketClosed { reason: String },

    #[error("Dashboard feed gave up after {attempts} reconnection attempts")]
    #[diagnostic(
        code(vidpulse::feed_failed),
        help("Raise `monitoring.max_reconnect_attempts` in your profile to retry longer.")
    )]
    FeedFailed { attempts: u32 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(vidpulse::auth_failed),
        help(
            "Verify the bearer token for profile '{profile}'.\n\
             Store a new one with: vidpulse config set-token --name {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Video '{video_id}' not found")]
    #[diagnostic(
        code(vidpulse::video_not_found),
        help("Check the video identifier; the backend returned 404.")
    )]
    VideoNotFound { video_id: String },

    #[error("Session '{session_id}' has expired")]
    #[diagnostic(code(vidpulse::session_expired), help("Start a new session with: vidpulse watch"))]
    SessionExpired { session_id: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(vidpulse::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vidpulse::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vidpulse::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vidpulse config init --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(vidpulse::no_config),
        help(
            "Create a profile with: vidpulse config init\n\
             Or pass --api-url / set VIDPULSE_API_URL.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(vidpulse::config))]
    Config(#[from] ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(vidpulse::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::SocketClosed { .. } | Self::FeedFailed { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::VideoNotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Config(ConfigError::Validation { .. }) => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::SocketClosed { reason } => CliError::SocketClosed { reason },

            CoreError::VideoNotFound { video_id } => CliError::VideoNotFound { video_id },

            CoreError::SessionExpired { session_id } => CliError::SessionExpired { session_id },

            CoreError::MonitorStopped => CliError::ApiError {
                code: "monitor_stopped".into(),
                message: "the network monitor stopped unexpectedly".into(),
            },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

impl From<vidpulse_api::Error> for CliError {
    fn from(err: vidpulse_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
