//! Browser fetcher: headful/headless Chrome automation.
//!
//! Pages are rendered in a shared browser whose profile persists for the
//! fetcher's lifetime, so cookies established during a login handshake apply
//! to every later fetch. Optional click-based pagination expands listing
//! pages before the DOM is captured.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;
use xxhash_rust::xxh3::xxh3_64;

use super::{FetchResponse, Fetcher, stealth};
use crate::config::{PaginationConfig, StealthConfig};

/// Full browser automation behind the `Fetcher` capability.
pub struct BrowserFetcher {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    pagination: PaginationConfig,
    stealth: StealthConfig,
    fetch_timeout: Duration,
}

impl BrowserFetcher {
    /// Launch a browser instance and start its CDP handler task.
    ///
    /// Fails when no Chrome/Chromium executable can be found or the launch
    /// itself fails; the engine treats that as a fatal init error.
    pub async fn launch(
        headless: bool,
        fetch_timeout: Duration,
        pagination: PaginationConfig,
        stealth: StealthConfig,
    ) -> Result<Self> {
        let executable = find_browser_executable()
            .context("no Chrome/Chromium executable found (set CHROMIUM_PATH to override)")?;

        let user_data_dir =
            std::env::temp_dir().join(format!("webvault_profile_{}", std::process::id()));
        std::fs::create_dir_all(&user_data_dir)
            .context("failed to create browser profile directory")?;

        let (width, height) = if stealth.randomize_viewport {
            stealth::random_viewport()
        } else {
            (1920, 1080)
        };

        let mut config_builder = BrowserConfigBuilder::default()
            .request_timeout(fetch_timeout)
            .window_size(width, height)
            .user_data_dir(user_data_dir)
            .chrome_executable(executable);

        if headless {
            config_builder = config_builder.headless_mode(HeadlessMode::default());
        } else {
            config_builder = config_builder.with_head();
        }

        config_builder = config_builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-notifications")
            .arg("--disable-background-networking")
            .arg("--disable-breakpad")
            .arg("--disable-hang-monitor")
            .arg("--disable-prompt-on-repost")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--metrics-recording-only")
            .arg("--password-store=basic")
            .arg("--mute-audio");

        let browser_config = config_builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(result) = handler.next().await {
                if let Err(e) = result {
                    let msg = e.to_string();
                    // Chrome emits CDP events chromiumoxide does not model;
                    // those deserialization failures are not actionable.
                    if !msg.contains("data did not match any variant of untagged enum Message") {
                        log::warn!("browser handler error: {msg}");
                    }
                }
            }
            log::debug!("browser handler task finished");
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler_task,
            pagination,
            stealth,
            fetch_timeout,
        })
    }

    /// Click an element, using simulated pointer motion and offset jitter
    /// when the corresponding knobs are on.
    async fn click_element(
        &self,
        page: &Page,
        element: &chromiumoxide::Element,
    ) -> anyhow::Result<()> {
        if self.stealth.simulate_mouse || self.stealth.randomize_click_offsets {
            let point = element.clickable_point().await?;
            let (x, y) = stealth::jitter_click_point(point.x, point.y, &self.stealth);
            stealth::natural_click(page, &self.stealth, x, y).await?;
        } else {
            element.click().await?;
        }
        Ok(())
    }

    async fn simulate_scrolling(&self, page: &Page) {
        for _ in 0..4 {
            let _ = page
                .evaluate("window.scrollBy(0, Math.floor(window.innerHeight * 0.8))")
                .await;
            tokio::time::sleep(Duration::from_millis(rand::random_range(120..350))).await;
        }
    }

    /// Repeatedly click the configured pagination selector, waiting after
    /// each click, until the selector disappears, the click budget runs out,
    /// or the DOM hash repeats.
    async fn run_pagination(&self, page: &Page) -> Result<()> {
        let Some(selector) = self.pagination.selector.clone() else {
            return Ok(());
        };

        let mut last_hash: Option<u64> = None;
        for click in 0..self.pagination.max_clicks {
            if self.stealth.simulate_action_delays {
                tokio::time::sleep(Duration::from_millis(rand::random_range(100..400))).await;
            }

            let element = match page.find_element(selector.as_str()).await {
                Ok(element) => element,
                Err(_) => {
                    log::debug!("pagination selector gone after {click} clicks");
                    break;
                }
            };
            if let Err(e) = self.click_element(page, &element).await {
                log::debug!("pagination click {click} failed: {e:#}");
                break;
            }

            tokio::time::sleep(self.pagination.wait_after_click).await;

            if let Some(wait_selector) = &self.pagination.wait_selector {
                for _ in 0..10 {
                    if page.find_element(wait_selector.as_str()).await.is_ok() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }

            if self.pagination.stop_on_duplicate {
                let html = page.content().await.unwrap_or_default();
                let hash = xxh3_64(html.as_bytes());
                if last_hash == Some(hash) {
                    log::debug!("pagination content repeated after {click} clicks");
                    break;
                }
                last_hash = Some(hash);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &Url, user_agent: &str) -> Result<FetchResponse> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .with_context(|| format!("failed to open page for {url}"))?
        };

        let effective_ua = stealth::pick_user_agent(&self.stealth, user_agent);
        if let Err(e) = stealth::apply(&page, &self.stealth, effective_ua).await {
            log::warn!("stealth setup failed for {url}: {e}");
        }

        let navigation = async {
            page.goto(url.as_str())
                .await
                .map_err(|e| anyhow::anyhow!("navigation failed: {e}"))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| anyhow::anyhow!("page load failed: {e}"))?;
            Ok::<(), anyhow::Error>(())
        };
        let nav_result = tokio::time::timeout(self.fetch_timeout, navigation).await;
        match nav_result {
            Ok(result) => result.with_context(|| format!("browser fetch failed for {url}"))?,
            Err(_) => {
                let _ = page.close().await;
                anyhow::bail!(
                    "browser fetch timed out after {:?} for {url}",
                    self.fetch_timeout
                );
            }
        }

        if self.stealth.simulate_scrolling {
            self.simulate_scrolling(&page).await;
        }

        if self.pagination.enabled
            && let Err(e) = self.run_pagination(&page).await
        {
            log::warn!("pagination failed for {url}: {e}");
        }

        let body = page
            .content()
            .await
            .with_context(|| format!("failed to capture DOM for {url}"))?;
        let _ = page.close().await;

        // The CDP surface does not expose the document's HTTP status cheaply;
        // a successful navigation reports 200 with an HTML content type.
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        Ok(FetchResponse {
            status: 200,
            headers,
            body,
        })
    }

    async fn close(&self) {
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                log::debug!("browser close failed: {e}");
            }
        }
        self.handler_task.abort();
    }
}

impl std::fmt::Debug for BrowserFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserFetcher")
            .field("pagination", &self.pagination.enabled)
            .finish_non_exhaustive()
    }
}

/// Locate a Chrome/Chromium executable.
///
/// `CHROMIUM_PATH` overrides everything; otherwise the platform's usual
/// install locations are probed, then `which` on Unix.
fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        log::warn!("CHROMIUM_PATH points to a non-existent file: {}", path.display());
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for name in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = std::process::Command::new("which").arg(name).output()
                && output.status.success()
            {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    return Ok(PathBuf::from(found));
                }
            }
        }
    }

    anyhow::bail!("Chrome/Chromium executable not found")
}
