//! HTTP client session
//!
//! One [`ClientHandle`] per pool slot: persistent cookie jar, redirects
//! disabled, HTTP error statuses passed through as ordinary responses.
//! Error semantics belong to assertions, not transport.

#![allow(dead_code)]

use reqwest::{redirect, Client, Method};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Transport-level errors; always classified as fatal for the owning
/// scenario.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid header {0}: {1}")]
    InvalidHeader(String, String),

    #[error("timeout after {0} seconds")]
    Timeout(u64),

    #[error("connection refused to {0}")]
    ConnectionRefused(String),

    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// One independent HTTP session.
///
/// Handles are owned by the [`ClientPool`](crate::http::ClientPool) and by
/// exactly one in-flight scenario run at a time. The cookie jar lives for
/// one scenario run: the pool resets it when the handle recirculates, so
/// cookies persist across steps but never across scenarios.
#[derive(Debug)]
pub struct ClientHandle {
    id: usize,
    client: Client,
    timeout_secs: u64,
}

fn build_client(timeout_secs: u64) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .map_err(|e| TransportError::Build(e.to_string()))
}

impl ClientHandle {
    /// Build a handle with its own cookie jar.
    pub fn new(id: usize, timeout_secs: u64) -> Result<Self, TransportError> {
        Ok(Self {
            id,
            client: build_client(timeout_secs)?,
            timeout_secs,
        })
    }

    /// Replace the inner session with a fresh one, dropping all
    /// accumulated cookie state. Keeps the slot id.
    pub(crate) fn reset(&mut self) -> Result<(), TransportError> {
        self.client = build_client(self.timeout_secs)?;
        Ok(())
    }

    /// Pool slot id, used in logs and traces.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Perform one exchange. Non-2xx statuses are successful transport
    /// results; only network-level failures error.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(
            client = self.id,
            "Sending {} request to {}", request.method, request.url
        );

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(request.method.clone()))?;

        let mut req_builder = self.client.request(method, &request.url);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            req_builder = req_builder.body(body.clone());
        }

        let start = std::time::Instant::now();

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                TransportError::ConnectionRefused(request.url.clone())
            } else {
                TransportError::RequestFailed(e.to_string())
            }
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        debug!(
            client = self.id,
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            headers,
            body,
            duration_ms,
        })
    }
}

/// HTTP request, fully substituted and ready to send.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// HTTP response snapshot handed to assertions and extensions.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Case-insensitive header lookup (reqwest stores names lowercased).
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_lowercase())
    }
}
