//! Outbound calls to the institution backend.
//!
//! The proxy talks to the backend through the [`Backend`] trait so routes
//! can be exercised without a network. [`HttpBackend`] is the reqwest
//! implementation used in production.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use rootcause::prelude::Report;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

/// Backend connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL every backend path is appended to.
    pub base_url: String,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Largest response body buffered when reading JSON, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl BackendConfig {
    /// Creates a configuration with default limits.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: default_timeout_seconds(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Payload of an outbound request.
#[derive(Debug, Clone)]
pub enum BackendBody {
    Empty,
    Json(serde_json::Value),
    /// Bytes forwarded as received, with their original content type.
    Raw {
        content_type: HeaderValue,
        bytes: Bytes,
    },
}

/// One outbound call.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: BackendBody,
}

impl BackendRequest {
    /// Path plus query string, as sent.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }
}

/// The backend's answer, body left unread.
#[derive(Debug)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl BackendResponse {
    /// Builds a JSON response.
    #[must_use]
    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            status,
            headers,
            body: Body::from(value.to_string()),
        }
    }

    /// Buffers the body, up to `limit` bytes.
    pub async fn bytes(self, limit: usize) -> Result<Bytes, BackendError> {
        axum::body::to_bytes(self.body, limit)
            .await
            .map_err(|e| BackendError::InvalidBody {
                details: e.to_string(),
            })
    }
}

/// Errors from outbound calls.
///
/// A non-success status is not an error at this level; the proxy decides
/// what to make of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The configured base URL or a derived URL is unusable.
    InvalidUrl { url: String, reason: String },
    /// The HTTP client could not be built.
    ClientBuild { details: String },
    /// Connecting or transferring failed.
    Transport { path: String, details: String },
    /// The backend did not answer before the timeout.
    Timeout { path: String },
    /// The body could not be read or decoded.
    InvalidBody { details: String },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url, reason } => write!(f, "invalid backend url '{url}': {reason}"),
            Self::ClientBuild { details } => write!(f, "failed to build HTTP client: {details}"),
            Self::Transport { path, details } => write!(f, "request to '{path}' failed: {details}"),
            Self::Timeout { path } => write!(f, "request to '{path}' timed out"),
            Self::InvalidBody { details } => write!(f, "unreadable backend body: {details}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Sends requests to the institution backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Sends one request and returns the raw answer.
    ///
    /// # Errors
    ///
    /// Returns an error only when no HTTP answer was obtained.
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, BackendError>;
}

/// [`Backend`] over reqwest.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a backend client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, Report<BackendError>> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| BackendError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BackendError::ClientBuild {
                details: e.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    fn url_for(&self, request: &BackendRequest) -> String {
        format!("{}{}", self.base_url, request.path_and_query())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let url = self.url_for(&request);
        let path = request.path.clone();

        let builder = self
            .client
            .request(request.method, &url)
            .headers(request.headers);
        let builder = match request.body {
            BackendBody::Empty => builder,
            BackendBody::Json(value) => builder.json(&value),
            BackendBody::Raw {
                content_type,
                bytes,
            } => builder
                .header(axum::http::header::CONTENT_TYPE, content_type)
                .body(bytes),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout { path: path.clone() }
            } else {
                BackendError::Transport {
                    path: path.clone(),
                    details: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        tracing::debug!(status = %status, "Backend answered");

        Ok(BackendResponse {
            status,
            headers,
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}
