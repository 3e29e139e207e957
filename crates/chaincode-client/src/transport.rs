//! Request/response transport to a peer's REST endpoint.
//!
//! The client core only ever sees [`Transport`]; [`HttpTransport`] is the
//! default implementation over `reqwest`. Tests substitute scripted
//! transports.

use async_trait::async_trait;
use chaincode_types::peer::PeerTarget;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Status reported when the request timed out.
pub const STATUS_TIMEOUT: u16 = 408;

/// Status reported when no HTTP response was received at all.
pub const STATUS_NO_RESPONSE: u16 = 500;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

/// A single request to a peer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Peer to contact.
    pub target: PeerTarget,
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path, e.g. `/chaincode`.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Give up after this long.
    pub timeout: Duration,
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status.
    pub status: u16,
    /// Decoded body. Empty bodies decode to `null`, non-JSON to a string.
    pub body: Value,
}

/// A failed exchange: non-2xx status, timeout, or connection error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status {status}: {cause}")]
pub struct TransportFailure {
    /// HTTP status, or a synthetic one for timeouts and connection errors.
    pub status: u16,
    /// Response body or error description.
    pub cause: String,
}

/// Performs one request/response exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and wait for its response.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure>;
}

/// [`Transport`] over HTTP(S) with `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new transport.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("chaincode-client/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Wrap an already configured `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        let url = format!("{}{}", request.target, request.path);
        debug!(url = %url, method = ?request.method, "Sending peer request");

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        let mut builder = builder
            .header("Accept", "application/json")
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(failure_from_reqwest)?;
        let status = response.status();
        let text = response.text().await.map_err(failure_from_reqwest)?;

        if !status.is_success() {
            return Err(TransportFailure {
                status: status.as_u16(),
                cause: text,
            });
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body: decode_body(&text),
        })
    }
}

fn failure_from_reqwest(e: reqwest::Error) -> TransportFailure {
    let status = if e.is_timeout() {
        STATUS_TIMEOUT
    } else {
        e.status().map(|s| s.as_u16()).unwrap_or(STATUS_NO_RESPONSE)
    };
    TransportFailure {
        status,
        cause: e.to_string(),
    }
}

/// `base` followed by `segment` as one percent-encoded path segment.
///
/// `/`, `?`, `#` and spaces in `segment` never change the route.
pub fn segment_path(base: &str, segment: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(segment.as_bytes()).collect();
    // form encoding writes spaces as `+`; a literal `+` is already `%2B`.
    format!("{base}/{}", encoded.replace('+', "%20"))
}

/// Decode a response body: JSON if possible, `null` if empty, else a string.
pub fn decode_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(text.to_string()))
}
