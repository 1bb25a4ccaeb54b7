//! Resolved configuration types for the crawl engine.
//!
//! `CrawlConfig` is the engine-facing shape: durations are `Duration`, paths
//! are `PathBuf`, and every default has been applied. Front ends construct a
//! [`crate::config::CrawlRequest`] and translate it here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::utils::constants::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_LINK_SELECTOR, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_PAGINATION_CLICKS, DEFAULT_MIN_CONTENT_LENGTH, DEFAULT_REQUEST_DELAY,
    DEFAULT_USER_AGENT, DEFAULT_WORKER_CEILING, CHECKPOINT_INTERVAL, DERIVED_DIR_NAME_CAP,
};

/// Which fetcher implementation the engine constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Lightweight pooled HTTP client.
    #[default]
    Http,
    /// Full browser automation.
    Browser,
}

/// Click-based pagination settings, honored only by the browser fetcher.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    pub enabled: bool,
    pub selector: Option<String>,
    pub max_clicks: u32,
    pub wait_after_click: Duration,
    pub wait_selector: Option<String>,
    /// Stop clicking once the DOM hash repeats.
    pub stop_on_duplicate: bool,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            selector: None,
            max_clicks: DEFAULT_MAX_PAGINATION_CLICKS,
            wait_after_click: Duration::from_secs(1),
            wait_selector: None,
            stop_on_duplicate: true,
        }
    }
}

/// Anti-detection knobs for the browser fetcher.
///
/// Carried as a transparent bag from the front end into the fetcher
/// constructor; the engine never inspects it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StealthConfig {
    pub hide_automation_markers: bool,
    pub spoof_plugins: bool,
    pub spoof_languages: bool,
    pub spoof_webgl: bool,
    pub spoof_canvas: bool,
    pub simulate_mouse: bool,
    pub simulate_scrolling: bool,
    pub simulate_typing: bool,
    pub simulate_action_delays: bool,
    pub randomize_click_offsets: bool,
    pub rotate_user_agent: bool,
    pub randomize_viewport: bool,
    pub match_timezone: bool,
    /// Explicit override; wins over `match_timezone`.
    pub timezone: Option<String>,
}

/// Fully resolved engine configuration.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub seed_url: String,
    pub output_dir: PathBuf,
    pub state_file: PathBuf,
    /// Bounded worker pool when true, single-worker loop otherwise.
    pub concurrent: bool,
    pub workers: usize,
    pub delay: Duration,
    pub fetch_timeout: Duration,
    pub max_depth: u32,
    pub prefix_filter: Option<String>,
    pub exclude_extensions: Vec<String>,
    pub link_selectors: Vec<String>,
    pub user_agent: String,
    pub ignore_robots: bool,
    pub min_content_length: usize,
    pub disable_content_extraction: bool,
    pub fetch_mode: FetchMode,
    pub headless: bool,
    pub wait_for_login: bool,
    pub normalize_urls: bool,
    pub lowercase_paths: bool,
    pub checkpoint_interval: u64,
    pub pagination: PaginationConfig,
    pub stealth: StealthConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed_url: String::new(),
            output_dir: PathBuf::from("./output"),
            state_file: PathBuf::from("./output_state.json"),
            concurrent: false,
            workers: DEFAULT_WORKER_CEILING,
            delay: DEFAULT_REQUEST_DELAY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            prefix_filter: None,
            exclude_extensions: Vec::new(),
            link_selectors: vec![DEFAULT_LINK_SELECTOR.to_string()],
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ignore_robots: false,
            min_content_length: DEFAULT_MIN_CONTENT_LENGTH,
            disable_content_extraction: false,
            fetch_mode: FetchMode::Http,
            headless: true,
            wait_for_login: false,
            normalize_urls: true,
            lowercase_paths: false,
            checkpoint_interval: CHECKPOINT_INTERVAL,
            pagination: PaginationConfig::default(),
            stealth: StealthConfig::default(),
        }
    }
}

impl CrawlConfig {
    /// Validate the resolved configuration.
    ///
    /// Rejects a seed that is not http(s)-with-host, an empty or unparsable
    /// link-selector list, an unparsable prefix filter, a zero worker
    /// ceiling, and `wait_for_login` without a headful browser.
    pub fn validate(&self) -> anyhow::Result<()> {
        let seed = Url::parse(&self.seed_url)
            .map_err(|e| anyhow::anyhow!("invalid seed URL '{}': {e}", self.seed_url))?;
        if !matches!(seed.scheme(), "http" | "https") {
            anyhow::bail!("seed URL must be http or https, got '{}'", seed.scheme());
        }
        if seed.host_str().is_none() {
            anyhow::bail!("seed URL has no host: '{}'", self.seed_url);
        }

        if self.link_selectors.is_empty() {
            anyhow::bail!("at least one link selector is required");
        }
        for sel in &self.link_selectors {
            scraper::Selector::parse(sel)
                .map_err(|e| anyhow::anyhow!("invalid link selector '{sel}': {e}"))?;
        }

        // Builds the filter once to surface prefix parse errors early.
        crate::utils::UrlFilter::new(self.prefix_filter.as_deref(), &self.exclude_extensions)?;

        if self.workers == 0 {
            anyhow::bail!("worker ceiling must be at least 1");
        }

        if self.wait_for_login && (self.fetch_mode != FetchMode::Browser || self.headless) {
            anyhow::bail!("wait_for_login requires fetch_mode = browser and headless = false");
        }

        if self.pagination.enabled && self.pagination.selector.is_none() {
            anyhow::bail!("pagination is enabled but no pagination selector is set");
        }

        Ok(())
    }
}

/// Derive the default output directory name from the seed's host and path.
///
/// `https://example.com/docs/api` → `example.com_docs_api`, sanitized with
/// the storage-writer replacement table and capped at 100 characters.
#[must_use]
pub fn default_output_dir(seed: &Url) -> PathBuf {
    let host = seed.host_str().unwrap_or("site");
    let path = seed.path().trim_matches('/');
    let mut name = if path.is_empty() {
        host.to_string()
    } else {
        format!("{host}_{path}")
    };
    name = name
        .chars()
        .map(|c| match c {
            '/' | ':' | '?' | '*' | '<' | '>' | '|' | '"' | '&' => '_',
            '=' => '-',
            other => other,
        })
        .collect();
    if name.len() > DERIVED_DIR_NAME_CAP {
        name.truncate(DERIVED_DIR_NAME_CAP);
    }
    PathBuf::from(name)
}

/// Default state-file path: a sibling of the output directory named
/// `<dir-basename>_state.json`, so the snapshot never lands inside the
/// mirrored content.
#[must_use]
pub fn default_state_file(output_dir: &Path) -> PathBuf {
    let basename = output_dir
        .file_name()
        .map_or_else(|| "crawl".to_string(), |n| n.to_string_lossy().into_owned());
    match output_dir.parent() {
        Some(parent) if parent != Path::new("") => parent.join(format!("{basename}_state.json")),
        _ => PathBuf::from(format!("{basename}_state.json")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_dir_name_sanitizes_and_caps() {
        let seed = Url::parse("https://example.com/docs/api?v=2").unwrap();
        assert_eq!(default_output_dir(&seed), PathBuf::from("example.com_docs_api"));

        let long = format!("https://example.com/{}", "a/".repeat(120));
        let seed = Url::parse(&long).unwrap();
        assert!(default_output_dir(&seed).to_string_lossy().len() <= 100);
    }

    #[test]
    fn state_file_is_dir_sibling() {
        assert_eq!(
            default_state_file(Path::new("mirror/example.com")),
            PathBuf::from("mirror/example.com_state.json")
        );
        assert_eq!(
            default_state_file(Path::new("example.com")),
            PathBuf::from("example.com_state.json")
        );
    }

    #[test]
    fn login_wait_requires_headful_browser() {
        let config = CrawlConfig {
            seed_url: "https://example.com/".to_string(),
            wait_for_login: true,
            fetch_mode: FetchMode::Browser,
            headless: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CrawlConfig {
            headless: false,
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_hostless_and_non_http_seeds() {
        for bad in ["file:///tmp/x", "not a url", "data:text/html,hi"] {
            let config = CrawlConfig {
                seed_url: bad.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{bad} should be rejected");
        }
    }
}
