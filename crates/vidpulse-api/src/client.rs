// Video backend HTTP client
//
// Wraps `reqwest::Client` with endpoint URL construction, bearer-token auth,
// status mapping and envelope unwrapping for the `/api/videos` surface,
// plus the two network probes (`HEAD /api/ping`, `GET /api/bandwidth-test`).

use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{
    ApiResponse, BandwidthSample, NetworkReport, SessionInfo, VideoAnalytics, VideoInfo,
};
use crate::transport::TransportConfig;

/// Timeout for the `HEAD /api/ping` latency probe.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the `GET /api/bandwidth-test` download.
pub const BANDWIDTH_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw HTTP client for the video backend.
///
/// Constructed once at startup and shared by `Arc`; there is no global
/// instance.
#[derive(Debug, Clone)]
pub struct VideoApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl VideoApiClient {
    /// Create a client from a `TransportConfig`, injecting the bearer token
    /// as a default header when one is given.
    pub fn new(
        base_url: Url,
        token: Option<&SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| Error::Authentication {
                    message: "API token contains characters not allowed in a header".into(),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /api/videos/{id}`
    pub async fn get_video(&self, video_id: &str) -> Result<VideoInfo, Error> {
        let url = self.api_url(&format!("videos/{video_id}"))?;
        self.get(url).await
    }

    /// `POST /api/videos/{id}/sessions` -- start a viewing session.
    pub async fn create_session(&self, video_id: &str) -> Result<SessionInfo, Error> {
        let url = self.api_url(&format!("videos/{video_id}/sessions"))?;
        self.post(url, &serde_json::json!({})).await
    }

    /// `POST /api/videos/sessions/{id}/network` -- report current metrics.
    pub async fn report_network(
        &self,
        session_id: &str,
        report: &NetworkReport,
    ) -> Result<(), Error> {
        let url = self.api_url(&format!("videos/sessions/{session_id}/network"))?;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(report)
            .send()
            .await
            .map_err(Error::Transport)?;
        check_status(resp).await.map(|_| ())
    }

    /// `GET /api/videos/{id}/analytics`
    pub async fn get_analytics(&self, video_id: &str) -> Result<VideoAnalytics, Error> {
        let url = self.api_url(&format!("videos/{video_id}/analytics"))?;
        self.get(url).await
    }

    /// `HEAD /api/ping` -- returns the measured round-trip time.
    pub async fn ping(&self) -> Result<Duration, Error> {
        let url = self.api_url("ping")?;
        trace!("HEAD {}", url);

        let started = Instant::now();
        let resp = self
            .http
            .head(url)
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::from_request(e, PING_TIMEOUT.as_secs()))?;
        let elapsed = started.elapsed();

        check_status(resp).await?;
        Ok(elapsed)
    }

    /// `GET /api/bandwidth-test` -- download the test payload and time it.
    pub async fn bandwidth_test(&self) -> Result<BandwidthSample, Error> {
        let url = self.api_url("bandwidth-test")?;
        trace!("GET {}", url);

        let started = Instant::now();
        let resp = self
            .http
            .get(url)
            .timeout(BANDWIDTH_TEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::from_request(e, BANDWIDTH_TEST_TIMEOUT.as_secs()))?;
        let resp = check_status(resp).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::from_request(e, BANDWIDTH_TEST_TIMEOUT.as_secs()))?;
        let elapsed = started.elapsed();

        Ok(BandwidthSample {
            bytes: u64::try_from(body.len()).unwrap_or(u64::MAX),
            elapsed,
        })
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        parse_body(resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        parse_body(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Map non-success statuses into typed errors; pass successes through.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned()
    });

    match status.as_u16() {
        401 | 403 => Err(Error::Authentication { message }),
        code => Err(Error::Api {
            status: code,
            message,
        }),
    }
}

/// Pull a human-readable message out of `{"error": "..."}` / `{"message": "..."}`.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .or_else(|| value.get("detail"))
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}

async fn parse_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let resp = check_status(resp).await?;
    let body = resp.text().await.map_err(Error::Transport)?;

    serde_json::from_str::<ApiResponse<T>>(&body)
        .map(ApiResponse::into_inner)
        .map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_without_double_slash() {
        let client = VideoApiClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://learn.example.com/").unwrap(),
        );
        assert_eq!(
            client.api_url("videos/abc").unwrap().as_str(),
            "https://learn.example.com/api/videos/abc"
        );
    }

    #[test]
    fn error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"message":"video not found","error":"E404"}"#).as_deref(),
            Some("video not found")
        );
        assert_eq!(error_message(r#"{"error":"nope"}"#).as_deref(), Some("nope"));
        assert!(error_message("<html>").is_none());
    }
}
