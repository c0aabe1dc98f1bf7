//! Remote fetch with bounded retry
//!
//! **Algorithm:**
//! 1. Validate the request (non-empty absolute URL, standard HTTP verb)
//! 2. Send through the transport
//! 3. 2xx → return the response
//! 4. Non-2xx → [`FetchError::Upstream`] immediately (no retry)
//! 5. Transient network fault:
//!    a. attempts remaining: log WARN, backoff, retry
//!    b. budget spent: log ERROR, return [`FetchError::TransientExhausted`]
//!       carrying the last transport error
//! 6. Non-transient transport fault → [`FetchError::Transport`] immediately

use crate::error::FetchError;
use crate::retry::RetryPolicy;
use crate::transport::{FetchRequest, FetchResponse, HttpTransport, Method, ReqwestTransport};
use dtk_common::config::FetchConfig;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Upstream error bodies are truncated to this many characters
const MAX_ERROR_BODY_CHARS: usize = 512;

const STANDARD_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// Single-call HTTP fetcher with retry/backoff on transient faults
#[derive(Clone)]
pub struct RemoteFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl RemoteFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// reqwest transport with timeout and retry cadence from config
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))
            .map_err(|source| FetchError::Transport {
                url: String::new(),
                source,
            })?;

        Ok(Self::new(Arc::new(transport), RetryPolicy::from_config(config)))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Same transport, different retry policy
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            transport: self.transport.clone(),
            policy,
        }
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        validate(request)?;

        let url = request.url.as_str();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if attempt > 1 {
                tracing::debug!(url, attempt, "Retrying upstream request");
            }

            match self.transport.send(request).await {
                Ok(response) if response.is_success() => {
                    if attempt > 1 {
                        tracing::info!(url, attempt, "Upstream request succeeded after retry");
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    let body: String = response.text().chars().take(MAX_ERROR_BODY_CHARS).collect();
                    tracing::warn!(
                        url,
                        status = response.status,
                        method = %request.method,
                        "Upstream returned error status"
                    );
                    return Err(FetchError::Upstream {
                        status: response.status,
                        url: url.to_string(),
                        body,
                    });
                }
                Err(err) if !err.is_transient() => {
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        source: err,
                    });
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        tracing::error!(
                            url,
                            attempt,
                            error = %err,
                            "Upstream request failed: retry budget exhausted"
                        );
                        return Err(FetchError::TransientExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last_error: err,
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        url,
                        attempt,
                        max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient upstream failure, will retry after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Fetch and decode a JSON body
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: &FetchRequest,
    ) -> Result<T, FetchError> {
        let response = self.fetch(request).await?;
        response.json().map_err(|e| FetchError::Decode {
            url: request.url.clone(),
            message: e.to_string(),
        })
    }
}

fn validate(request: &FetchRequest) -> Result<(), FetchError> {
    if request.url.trim().is_empty() {
        return Err(FetchError::InvalidRequest("URL must not be empty".to_string()));
    }
    reqwest::Url::parse(&request.url)
        .map_err(|e| FetchError::InvalidRequest(format!("Malformed URL '{}': {}", request.url, e)))?;
    if !STANDARD_METHODS.contains(&request.method) {
        return Err(FetchError::InvalidRequest(format!(
            "Unsupported HTTP method: {}",
            request.method
        )));
    }
    Ok(())
}
