//! Pluggable page fetching.
//!
//! The engine depends on the `Fetcher` capability only; configuration
//! selects between the lightweight protocol client and full browser
//! automation. Both set the configured user agent on the initial request and
//! preserve it across redirects up to a bounded limit.

pub mod browser;
pub mod http;
pub mod stealth;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

/// A fetched response: status, lowercased header map, and body text.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl FetchResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Capability the engine uses to retrieve pages.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, sending `user_agent` with the request. Transport
    /// failures are errors; non-success statuses are returned as responses.
    async fn fetch(&self, url: &Url, user_agent: &str) -> Result<FetchResponse>;

    /// Release underlying resources. Idempotent.
    async fn close(&self);
}
