//! HTTP client used for both the CDX index and archived content.

mod retry;
mod user_agent;

pub use retry::{classify_status, FailureType, RetryPolicy, DEFAULT_MAX_RETRIES};
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

/// Errors from a single HTTP fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),
}

impl FetchError {
    /// Whether this failure is worth retrying.
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Timeout | Self::Network(_) => FailureType::Transient,
            Self::Status(code) => classify_status(*code),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Body and metadata of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Anything that can fetch the bytes behind a URL.
///
/// The download service talks to this trait so it can run against the real
/// archive or an in-memory fixture.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError>;
}

/// Successful HTTP response wrapper.
pub struct HttpResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    response: Response,
}

impl HttpResponse {
    /// Get response body as bytes.
    pub async fn bytes(self) -> Result<Vec<u8>, FetchError> {
        Ok(self.response.bytes().await?.to_vec())
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, FetchError> {
        Ok(self.response.text().await?)
    }
}

/// Thin reqwest wrapper with a per-request timeout and politeness delay.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    ///
    /// `user_agent_config` follows [`resolve_user_agent`]: `None` for the
    /// default agent, `"impersonate"` for a browser agent, anything else verbatim.
    pub fn new(
        timeout: Duration,
        request_delay: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, reqwest::Error> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            request_delay,
        })
    }

    /// Make a GET request. Non-2xx responses become [`FetchError::Status`].
    pub async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(HttpResponse {
            status,
            content_type,
            response,
        })
    }

    /// Get page content as text.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.get(url).await?.text().await
    }
}

#[async_trait]
impl ContentFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let response = self.get(url).await?;
        let content_type = response.content_type.clone();
        let bytes = response.bytes().await?;
        Ok(FetchedContent {
            bytes,
            content_type,
        })
    }
}
