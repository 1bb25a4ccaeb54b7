//! Type-safe builder for `CrawlConfig` using the typestate pattern.
//!
//! The seed URL is the only required field; `build()` is available only once
//! it has been supplied, derives the output directory and state file when
//! unset, and runs full validation.

use anyhow::Result;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use super::types::{
    CrawlConfig, FetchMode, PaginationConfig, StealthConfig, default_output_dir,
    default_state_file,
};

/// Type state: the seed URL has been supplied.
pub struct WithSeedUrl;

pub struct CrawlConfigBuilder<State = ()> {
    config: CrawlConfig,
    output_dir_set: bool,
    state_file_set: bool,
    _phantom: PhantomData<State>,
}

impl CrawlConfig {
    /// Create a builder for configuring a `CrawlConfig` with a fluent interface.
    #[must_use]
    pub fn builder() -> CrawlConfigBuilder<()> {
        CrawlConfigBuilder {
            config: CrawlConfig::default(),
            output_dir_set: false,
            state_file_set: false,
            _phantom: PhantomData,
        }
    }
}

impl CrawlConfigBuilder<()> {
    /// Set the seed URL, unlocking `build()`.
    ///
    /// A bare host like `example.com` is upgraded to `https://example.com`;
    /// anything already carrying a scheme is validated as-is.
    pub fn seed_url(self, url: impl Into<String>) -> CrawlConfigBuilder<WithSeedUrl> {
        let raw = url.into();
        let seed_url = if raw.contains("://") {
            raw
        } else {
            format!("https://{raw}")
        };
        CrawlConfigBuilder {
            config: CrawlConfig {
                seed_url,
                ..self.config
            },
            output_dir_set: self.output_dir_set,
            state_file_set: self.state_file_set,
            _phantom: PhantomData,
        }
    }
}

impl<State> CrawlConfigBuilder<State> {
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self.output_dir_set = true;
        self
    }

    #[must_use]
    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_file = path.into();
        self.state_file_set = true;
        self
    }

    #[must_use]
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.config.concurrent = concurrent;
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    #[must_use]
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.config.max_depth = depth;
        self
    }

    #[must_use]
    pub fn prefix_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.prefix_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn exclude_extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.exclude_extensions = extensions;
        self
    }

    #[must_use]
    pub fn link_selectors(mut self, selectors: Vec<String>) -> Self {
        self.config.link_selectors = selectors;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn ignore_robots(mut self, ignore: bool) -> Self {
        self.config.ignore_robots = ignore;
        self
    }

    #[must_use]
    pub fn min_content_length(mut self, length: usize) -> Self {
        self.config.min_content_length = length;
        self
    }

    #[must_use]
    pub fn disable_content_extraction(mut self, disable: bool) -> Self {
        self.config.disable_content_extraction = disable;
        self
    }

    #[must_use]
    pub fn fetch_mode(mut self, mode: FetchMode) -> Self {
        self.config.fetch_mode = mode;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    #[must_use]
    pub fn wait_for_login(mut self, wait: bool) -> Self {
        self.config.wait_for_login = wait;
        self
    }

    #[must_use]
    pub fn normalize_urls(mut self, normalize: bool) -> Self {
        self.config.normalize_urls = normalize;
        self
    }

    #[must_use]
    pub fn lowercase_paths(mut self, lowercase: bool) -> Self {
        self.config.lowercase_paths = lowercase;
        self
    }

    #[must_use]
    pub fn checkpoint_interval(mut self, interval: u64) -> Self {
        self.config.checkpoint_interval = interval;
        self
    }

    #[must_use]
    pub fn pagination(mut self, pagination: PaginationConfig) -> Self {
        self.config.pagination = pagination;
        self
    }

    #[must_use]
    pub fn stealth(mut self, stealth: StealthConfig) -> Self {
        self.config.stealth = stealth;
        self
    }
}

// Build is only available once the seed URL has been set.
impl CrawlConfigBuilder<WithSeedUrl> {
    /// Derive unset paths from the seed, then validate and return the config.
    pub fn build(mut self) -> Result<CrawlConfig> {
        let seed = Url::parse(&self.config.seed_url)
            .map_err(|e| anyhow::anyhow!("invalid seed URL '{}': {e}", self.config.seed_url))?;

        if !self.output_dir_set {
            self.config.output_dir = default_output_dir(&seed);
        }
        if !self.state_file_set {
            self.config.state_file = default_state_file(&self.config.output_dir);
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_derived_paths() {
        let config = CrawlConfig::builder()
            .seed_url("https://example.com/docs")
            .build()
            .expect("valid config");
        assert_eq!(config.output_dir, PathBuf::from("example.com_docs"));
        assert_eq!(config.state_file, PathBuf::from("example.com_docs_state.json"));
    }

    #[test]
    fn bare_host_gets_https() {
        let config = CrawlConfig::builder().seed_url("example.com").build().unwrap();
        assert_eq!(config.seed_url, "https://example.com");
    }

    #[test]
    fn explicit_paths_survive() {
        let config = CrawlConfig::builder()
            .seed_url("https://example.com")
            .output_dir("mirror")
            .state_file("mirror.state")
            .build()
            .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("mirror"));
        assert_eq!(config.state_file, PathBuf::from("mirror.state"));
    }

    #[test]
    fn invalid_selector_fails_build() {
        let result = CrawlConfig::builder()
            .seed_url("https://example.com")
            .link_selectors(vec!["a[".to_string()])
            .build();
        assert!(result.is_err());
    }
}
