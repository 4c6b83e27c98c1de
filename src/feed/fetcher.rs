use crate::feed::parser::{parse_feed, ParseError, ParsedFeed};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Ceiling on a whole fetch: connect, response headers and body
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// `User-Agent` sent with every feed request
pub const DEFAULT_USER_AGENT: &str = concat!("gator/", env!("CARGO_PKG_VERSION"));

/// Why a fetch failed.
#[derive(Debug, Error)]
pub enum FetchErrorKind {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The fetch did not finish within the fetcher's timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("response too large")]
    ResponseTooLarge,
    /// Body was not a usable RSS document
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// A failed fetch of one feed URL.
#[derive(Debug, Error)]
#[error("failed to fetch feed from {url}: {kind}")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub kind: FetchErrorKind,
}

impl FetchErrorKind {
    /// Classify a reqwest failure, from `send()` or mid-body.
    fn from_request(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            FetchErrorKind::Timeout(timeout)
        } else {
            FetchErrorKind::Network(e)
        }
    }
}

impl FetchError {
    fn new(url: &str, kind: impl Into<FetchErrorKind>) -> Self {
        Self {
            url: url.to_string(),
            kind: kind.into(),
        }
    }
}

/// Retrieves and parses RSS feeds over HTTP(S).
///
/// Cloning is cheap; clones share the underlying connection pool. There is
/// no retry here: a failed feed is simply picked up again on a later cycle.
#[derive(Clone, Debug)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl FeedFetcher {
    /// Build a fetcher with the given `User-Agent` and overall timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Build a fetcher with [`DEFAULT_USER_AGENT`] and [`FETCH_TIMEOUT`].
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        Self::new(DEFAULT_USER_AGENT, FETCH_TIMEOUT)
    }

    /// Fetch `url` and parse the body as an RSS document.
    ///
    /// # Errors
    ///
    /// The returned [`FetchError`] names `url` and one of:
    /// - [`FetchErrorKind::Network`] - connection or TLS errors
    /// - [`FetchErrorKind::Timeout`] - the whole exchange exceeded the timeout
    /// - [`FetchErrorKind::HttpStatus`] - non-2xx HTTP response
    /// - [`FetchErrorKind::ResponseTooLarge`] - body over 10MB
    /// - [`FetchErrorKind::Parse`] - body is not RSS
    pub async fn fetch(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.fetch_bytes(url))
            .await
            .map_err(|_| FetchError::new(url, FetchErrorKind::Timeout(self.timeout)))?
            .map_err(|kind| FetchError::new(url, kind))?;

        let feed = parse_feed(&bytes).map_err(|e| FetchError::new(url, e))?;
        tracing::debug!(
            feed = %url,
            title = %feed.title,
            items = feed.items.len(),
            bytes = bytes.len(),
            "Fetched feed"
        );
        Ok(feed)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchErrorKind> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchErrorKind::from_request(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(FetchErrorKind::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE, self.timeout).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<u8>, FetchErrorKind> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchErrorKind::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchErrorKind::from_request(e, timeout))?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchErrorKind::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
