//! Fetch executor: one endpoint, bounded attempts, bounded time per attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;

use crate::resolver::{ConfigError, ResolvedEndpoint};

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("Malformed JSON response: {0}")]
    Parse(String),
}

/// Result of a full attempt chain.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success { data: Value, attempts: u32 },
    Failure { error: FetchError, attempts: u32 },
}

impl FetchOutcome {
    /// Number of requests issued.
    pub fn attempts(&self) -> u32 {
        match self {
            FetchOutcome::Success { attempts, .. } | FetchOutcome::Failure { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Raw response handed back by a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Issues a single request for an endpoint.
///
/// The executor owns timeouts and retries; a transport only performs one
/// round trip. Dropping the returned future must abort the request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: &ResolvedEndpoint) -> Result<HttpResponse, FetchError>;
}

/// [`Transport`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(concat!("api-inliner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, endpoint: &ResolvedEndpoint) -> Result<HttpResponse, FetchError> {
        let mut request = self
            .client
            .request(endpoint.request.method.clone(), endpoint.url.clone())
            .header(header::ACCEPT, "application/json");

        for (name, value) in &endpoint.request.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(body) = &endpoint.request.body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Runs the attempt chain for one endpoint.
#[derive(Clone)]
pub struct FetchExecutor {
    transport: Arc<dyn Transport>,
}

impl FetchExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch an endpoint, retrying immediately up to `retry_count` times.
    ///
    /// Network errors, timeouts, non-2xx statuses and malformed bodies are
    /// all retried the same way; each retry re-issues the whole request with
    /// a fresh timeout window.
    pub async fn fetch(&self, endpoint: &ResolvedEndpoint) -> FetchOutcome {
        let mut attempt: u32 = 1;

        loop {
            match self.attempt(endpoint).await {
                Ok(data) => {
                    return FetchOutcome::Success {
                        data,
                        attempts: attempt,
                    }
                }
                Err(error) if attempt <= endpoint.retry_count => {
                    tracing::debug!(
                        "Attempt {} of {} for {} failed: {}",
                        attempt,
                        endpoint.retry_count + 1,
                        endpoint.label(),
                        error
                    );
                    attempt += 1;
                }
                Err(error) => {
                    return FetchOutcome::Failure {
                        error,
                        attempts: attempt,
                    }
                }
            }
        }
    }

    async fn attempt(&self, endpoint: &ResolvedEndpoint) -> Result<Value, FetchError> {
        // Timing out drops the in-flight request, which releases its connection.
        let response = tokio::time::timeout(endpoint.request_timeout, self.transport.send(endpoint))
            .await
            .map_err(|_| FetchError::Timeout(endpoint.request_timeout))??;

        if !(200..300).contains(&response.status) {
            return Err(FetchError::HttpStatus(response.status));
        }

        serde_json::from_slice(&response.body).map_err(|e| FetchError::Parse(e.to_string()))
    }
}
