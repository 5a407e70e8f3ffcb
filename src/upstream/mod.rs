//! Upstream client: the authenticated call into the Omie API.
//!
//! One [`Upstream::invoke`] is exactly one HTTP POST. There are no retries;
//! whatever goes wrong is handed straight back to the coordinator.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::coordinator::RequestEnvelope;

/// Public Omie API origin; envelope `url`s are appended to it verbatim.
pub const DEFAULT_BASE_URL: &str = "https://app.omie.com.br/api/v1/";

/// Budget for one upstream call, body included.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors produced by an upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned status code {status}")]
    Status { status: u16 },

    #[error("failed to encode upstream request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A credential that must never reach a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Application key and secret injected into every upstream body.
#[derive(Debug, Clone)]
pub struct OmieCredentials {
    pub app_key: Secret,
    pub app_secret: Secret,
}

/// The source of truth behind the cache.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Performs the call described by `envelope` and returns the raw body.
    async fn invoke(&self, envelope: &RequestEnvelope) -> Result<Bytes, UpstreamError>;
}

#[derive(Serialize)]
struct OmieCall<'a> {
    call: &'a str,
    app_key: &'a str,
    app_secret: &'a str,
    param: &'a [Map<String, Value>],
}

/// [`Upstream`] over HTTPS with `reqwest`.
pub struct OmieClient {
    http: reqwest::Client,
    base_url: String,
    credentials: OmieCredentials,
    timeout: Duration,
}

impl OmieClient {
    /// Builds a client with the standard [`UPSTREAM_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Transport`] if the HTTP client cannot be built
    /// (e.g. no TLS backend).
    pub fn new(base_url: impl Into<String>, credentials: OmieCredentials) -> Result<Self, UpstreamError> {
        Self::with_timeout(base_url, credentials, UPSTREAM_TIMEOUT)
    }

    /// Builds a client with a custom per-call timeout.
    ///
    /// # Errors
    ///
    /// Same as [`OmieClient::new`].
    pub fn with_timeout(
        base_url: impl Into<String>,
        credentials: OmieCredentials,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            credentials,
            timeout,
        })
    }

    fn endpoint(&self, envelope: &RequestEnvelope) -> String {
        format!("{}{}", self.base_url, envelope.url)
    }

    fn classify(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else {
            UpstreamError::Transport(err)
        }
    }
}

impl fmt::Debug for OmieClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OmieClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Upstream for OmieClient {
    async fn invoke(&self, envelope: &RequestEnvelope) -> Result<Bytes, UpstreamError> {
        let body = serde_json::to_vec(&OmieCall {
            call: &envelope.call,
            app_key: self.credentials.app_key.expose(),
            app_secret: self.credentials.app_secret.expose(),
            param: &envelope.param,
        })?;

        let url = self.endpoint(envelope);
        debug!(call = %envelope.call, url = %url, "calling upstream");

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| self.classify(e))
    }
}
