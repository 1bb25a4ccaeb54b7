//! robots.txt policy cache.
//!
//! Per unique origin, `/robots.txt` is fetched lazily and memoized for the
//! engine's lifetime. Any failure (network, non-success status) caches a
//! tombstone meaning "no policy available, allow everything". The cache is
//! engine-scoped, never process-scoped, so concurrent jobs crawling the same
//! host with different user agents never share entries.

use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

pub struct RobotsCache {
    client: reqwest::Client,
    records: RwLock<HashMap<String, Option<String>>>,
}

impl RobotsCache {
    /// A cache whose policy fetches time out after `timeout`.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build robots client: {e}"))?;
        Ok(Self {
            client,
            records: RwLock::new(HashMap::new()),
        })
    }

    /// Whether `user_agent` may fetch `url` under the host's policy.
    ///
    /// Allows when no record exists, the fetch failed, or no group matches.
    pub async fn allowed(&self, url: &Url, user_agent: &str) -> bool {
        let Some(origin) = origin_key(url) else {
            return true;
        };

        {
            let records = self.records.read().await;
            if let Some(record) = records.get(&origin) {
                return Self::check(record.as_deref(), user_agent, url);
            }
        }

        // No lock is held across the fetch.
        let fetched = self.fetch_policy(&origin, user_agent).await;

        let mut records = self.records.write().await;
        let record = records.entry(origin).or_insert(fetched);
        Self::check(record.as_deref(), user_agent, url)
    }

    async fn fetch_policy(&self, origin: &str, user_agent: &str) -> Option<String> {
        let robots_url = format!("{origin}/robots.txt");
        match self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    log::debug!("cached robots.txt for {origin} ({} bytes)", body.len());
                    Some(body)
                }
                Err(e) => {
                    log::debug!("robots.txt body read failed for {origin}: {e}");
                    None
                }
            },
            Ok(response) => {
                log::debug!(
                    "robots.txt for {origin} returned {}, allowing everything",
                    response.status()
                );
                None
            }
            Err(e) => {
                log::debug!("robots.txt fetch failed for {origin}: {e}");
                None
            }
        }
    }

    fn check(record: Option<&str>, user_agent: &str, url: &Url) -> bool {
        match record {
            Some(body) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(body, user_agent, url.as_str())
            }
            None => true,
        }
    }
}

impl std::fmt::Debug for RobotsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotsCache").finish_non_exhaustive()
    }
}

/// `scheme://host[:port]` cache key for a URL, `None` for host-less URLs.
fn origin_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{}://{host}:{port}", url.scheme())),
        None => Some(format!("{}://{host}", url.scheme())),
    }
}
