//! Front-end configuration and its translation into engine configuration.
//!
//! `CrawlRequest` is the serde-friendly shape accepted by every front end:
//! durations are human strings (`"500ms"`, `"2s"`), paths are optional, and
//! the legacy `disable_readability` flag is still honored. The job manager
//! calls [`CrawlRequest::into_config`] to resolve it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::types::{CrawlConfig, FetchMode, PaginationConfig, StealthConfig};

/// Pagination settings as carried in a request (browser mode only).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationRequest {
    pub enable: bool,
    pub selector: Option<String>,
    pub max_clicks: Option<u32>,
    pub wait_after_click: Option<String>,
    pub wait_selector: Option<String>,
    pub stop_on_duplicate: Option<bool>,
}

/// External crawl configuration, as received from a front end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlRequest {
    /// Seed URL. Required; must be http(s) with a host.
    pub url: String,
    pub concurrent: bool,
    /// Human-readable duration, e.g. `"500ms"` or `"2s"`.
    pub delay: Option<String>,
    pub max_depth: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    /// URL prefix to stay under; empty or `"none"` disables.
    pub prefix_filter: Option<String>,
    pub exclude_extensions: Vec<String>,
    pub link_selectors: Vec<String>,
    pub user_agent: Option<String>,
    pub ignore_robots: bool,
    pub min_content_length: Option<usize>,
    pub disable_content_extraction: bool,
    /// Legacy alias for `disable_content_extraction`.
    pub disable_readability: bool,
    pub fetch_mode: FetchMode,
    pub headless: Option<bool>,
    pub wait_for_login: bool,
    pub normalize_urls: Option<bool>,
    pub lowercase_paths: bool,
    pub pagination: PaginationRequest,
    pub stealth: StealthConfig,
}

impl CrawlRequest {
    /// A request for `url` with everything else defaulted.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Resolve this request into a validated engine configuration.
    ///
    /// Applies defaults, parses duration strings, collapses the legacy
    /// readability flag, and derives the output directory and state file
    /// when not provided.
    pub fn into_config(self) -> Result<CrawlConfig> {
        let mut builder = CrawlConfig::builder().seed_url(self.url);

        if let Some(delay) = self.delay.as_deref() {
            builder = builder.delay(parse_duration(delay, "delay")?);
        }
        if let Some(depth) = self.max_depth {
            builder = builder.max_depth(depth);
        }
        if let Some(dir) = self.output_dir {
            builder = builder.output_dir(dir);
        }
        if let Some(state) = self.state_file {
            builder = builder.state_file(state);
        }
        if let Some(prefix) = self.prefix_filter {
            builder = builder.prefix_filter(prefix);
        }
        if !self.exclude_extensions.is_empty() {
            builder = builder.exclude_extensions(self.exclude_extensions);
        }
        if !self.link_selectors.is_empty() {
            builder = builder.link_selectors(self.link_selectors);
        }
        if let Some(ua) = self.user_agent {
            builder = builder.user_agent(ua);
        }
        if let Some(min) = self.min_content_length {
            builder = builder.min_content_length(min);
        }
        if let Some(headless) = self.headless {
            builder = builder.headless(headless);
        }
        if let Some(normalize) = self.normalize_urls {
            builder = builder.normalize_urls(normalize);
        }

        let pagination = PaginationConfig {
            enabled: self.pagination.enable,
            selector: self.pagination.selector,
            max_clicks: self
                .pagination
                .max_clicks
                .unwrap_or(PaginationConfig::default().max_clicks),
            wait_after_click: match self.pagination.wait_after_click.as_deref() {
                Some(raw) => parse_duration(raw, "pagination.wait_after_click")?,
                None => PaginationConfig::default().wait_after_click,
            },
            wait_selector: self.pagination.wait_selector,
            stop_on_duplicate: self.pagination.stop_on_duplicate.unwrap_or(true),
        };

        builder
            .concurrent(self.concurrent)
            .ignore_robots(self.ignore_robots)
            .disable_content_extraction(self.disable_content_extraction || self.disable_readability)
            .fetch_mode(self.fetch_mode)
            .wait_for_login(self.wait_for_login)
            .lowercase_paths(self.lowercase_paths)
            .pagination(pagination)
            .stealth(self.stealth)
            .build()
    }
}

fn parse_duration(raw: &str, field: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim())
        .with_context(|| format!("invalid {field} duration '{raw}' (expected e.g. \"500ms\", \"2s\")"))
}
