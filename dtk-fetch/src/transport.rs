//! HTTP transport abstraction
//!
//! [`crate::RemoteFetcher`] owns retry policy; the transport owns timeouts and
//! connection handling. Production uses [`ReqwestTransport`], tests inject
//! scripted transports.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

pub use reqwest::Method;

/// Default user agent sent upstream
const USER_AGENT: &str = concat!("datatalker/", env!("CARGO_PKG_VERSION"));

/// Transport-level failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not connect or the connection dropped while sending
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request exceeded the transport timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection interrupted while reading the response body
    #[error("response interrupted: {0}")]
    Interrupted(String),

    /// Request could not be constructed; retrying cannot help
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl TransportError {
    /// Network/connectivity class faults are worth retrying
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Invalid(_))
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_builder() || err.is_redirect() {
            TransportError::Invalid(err.to_string())
        } else if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Interrupted(err.to_string())
        } else {
            TransportError::Connect(err.to_string())
        }
    }
}

/// An outbound HTTP request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<serde_json::Value>,
}

impl FetchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            json_body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        let mut request = Self::new(Method::POST, url);
        request.json_body = Some(body);
        request
    }

    /// Append a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append several query parameters, preserving order
    pub fn params<K, V, I>(mut self, params: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }
}

/// A fully-read HTTP response
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Sends one request, with no retry
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// reqwest-backed transport with a per-request timeout
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Invalid(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.query);

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(TransportError::from_reqwest)?;

        Ok(FetchResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_is_not_transient() {
        assert!(!TransportError::Invalid("bad header".into()).is_transient());
        assert!(TransportError::Connect("refused".into()).is_transient());
        assert!(TransportError::Timeout("30s".into()).is_transient());
        assert!(TransportError::Interrupted("reset".into()).is_transient());
    }

    #[test]
    fn test_request_builder_keeps_param_order() {
        let request = FetchRequest::get("https://example.org/catalogs")
            .query("format", "json")
            .params([("offset", "0"), ("limit", "10")]);

        let keys: Vec<&str> = request.query.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["format", "offset", "limit"]);
        assert_eq!(request.method, Method::GET);
    }

    #[test]
    fn test_response_success_range() {
        assert!(FetchResponse::new(200, "").is_success());
        assert!(FetchResponse::new(204, "").is_success());
        assert!(!FetchResponse::new(301, "").is_success());
        assert!(!FetchResponse::new(404, "").is_success());
    }

    #[test]
    fn test_transport_creation() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
