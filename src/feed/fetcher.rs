use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::feed::crawl::PageSource;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching one feed page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    /// Returns true if this error is transient and the request should be retried.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout
            | FetchError::Network(_)
            | FetchError::RateLimited(_)
            | FetchError::IncompleteResponse { .. } => true,
            FetchError::HttpStatus(status) => *status >= 500,
            FetchError::ResponseTooLarge => false,
        }
    }

    /// True for an HTTP 404, which WordPress returns for pages past the last one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::HttpStatus(404))
    }
}

/// Transport settings for feed requests.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-request timeout, covering connect, headers and body.
    pub timeout: Duration,
    /// Extra attempts after the first one for transient failures.
    pub retries: u32,
    /// First backoff delay; doubles on every retry.
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            retry_backoff: Duration::from_secs(1),
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Fetches feed pages over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    options: HttpOptions,
}

impl HttpSource {
    /// Builds the HTTP client for a run.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the TLS backend cannot be initialised.
    pub fn new(options: HttpOptions) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.as_str())
            .build()?;
        Ok(Self::with_client(client, options))
    }

    /// Uses a caller-configured client.
    pub fn with_client(client: reqwest::Client, options: HttpOptions) -> Self {
        Self { client, options }
    }

    async fn fetch_once(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let response =
            tokio::time::timeout(self.options.timeout, self.client.get(url.as_str()).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(FetchError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited(self.options.retries));
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        tokio::time::timeout(
            self.options.timeout,
            read_limited_bytes(response, MAX_FEED_SIZE),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
    }
}

impl PageSource for HttpSource {
    /// Fetches one page, retrying transient failures with exponential backoff.
    ///
    /// # Errors
    ///
    /// - [`FetchError::HttpStatus`] - non-2xx response (4xx fail immediately,
    ///   5xx after retries)
    /// - [`FetchError::RateLimited`] - 429 response after max retries
    /// - [`FetchError::Timeout`] / [`FetchError::Network`] - after max retries
    /// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
    async fn fetch_page(&mut self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable() && retry_count < self.options.retries => {
                    let delay = self
                        .options
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(retry_count));
                    tracing::warn!(
                        url = %url,
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient fetch failure, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
