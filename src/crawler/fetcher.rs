//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests producing `ResponseEnvelope`s
//! - Status allow-listing
//! - Error classification into `TransportError`

use crate::config::CrawlerConfig;
use crate::state::{RequestDescriptor, ResponseEnvelope};
use crate::TransportError;
use reqwest::header::{HeaderName, CONTENT_TYPE, LINK};
use reqwest::Client;
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// Redirects follow reqwest's default policy; the envelope records the
/// post-redirect URL.
///
/// # Example
///
/// ```no_run
/// use gleaner::config::CrawlerConfig;
/// use gleaner::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Executes fetches for the scheduler
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
    allowed_statuses: Vec<u16>,
}

impl Fetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            timeout: Duration::from_secs(config.timeout_secs),
            allowed_statuses: config.allowed_statuses.clone(),
        })
    }

    /// Returns true if a response with this status carries a usable document
    pub fn accepts_status(&self, status: u16) -> bool {
        (200..300).contains(&status) || self.allowed_statuses.contains(&status)
    }

    /// Fetches a request, bounded by the configured timeout
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | No complete response within the timeout | `Timeout` |
    /// | Non-2xx status outside the allow-list | `Status` |
    /// | Connection, TLS or redirect failure | `Network` |
    /// | Body could not be read or decoded | `Body` |
    pub async fn fetch(
        &self,
        request: RequestDescriptor,
    ) -> Result<ResponseEnvelope, TransportError> {
        let url = request.url().to_string();

        match tokio::time::timeout(self.timeout, self.fetch_inner(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout { url }),
        }
    }

    async fn fetch_inner(
        &self,
        request: RequestDescriptor,
    ) -> Result<ResponseEnvelope, TransportError> {
        let url = request.url().to_string();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_error(&url, e))?;

        let status = response.status().as_u16();
        if !self.accepts_status(status) {
            return Err(TransportError::Status { url, status });
        }

        let final_url = response.url().to_string();
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let link_header = header(LINK);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout { url: url.clone() }
            } else {
                TransportError::Body {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        tracing::debug!("Fetched {} ({} bytes, status {})", final_url, body.len(), status);

        Ok(ResponseEnvelope {
            status,
            content_type,
            final_url,
            link_header,
            body,
            request,
        })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
