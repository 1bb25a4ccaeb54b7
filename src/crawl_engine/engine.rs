//! The crawl orchestrator.
//!
//! `CrawlEngine::start()` blocks until the crawl reaches a terminal state:
//! frontier drained, cancellation, or a fatal initialization error. The
//! frontier drains under either a single-worker loop or a bounded worker
//! pool; pause, login, and cancellation gates sit between actions, and the
//! durable state is checkpointed periodically and once at termination.

use anyhow::{Context, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;
use tokio::sync::{Notify, Semaphore, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::metrics::{CrawlMetrics, MetricsSnapshot};
use super::status::CrawlStatus;
use crate::config::{CrawlConfig, FetchMode};
use crate::crawl_events::{CrawlEvent, EventEmitter};
use crate::crawl_state::{CrawlState, FrontierEntry};
use crate::fetcher::{BrowserFetcher, Fetcher, HttpFetcher};
use crate::robots::RobotsCache;
use crate::utils::constants::FRONTIER_IDLE_POLL;
use crate::utils::{UrlFilter, url_norm};

/// How a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The frontier drained.
    Completed,
    /// Cancellation was requested and the final checkpoint flushed.
    Stopped,
}

/// Decrements the active-worker counter even when a worker panics.
struct WorkerGuard(Arc<AtomicUsize>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct CrawlEngine {
    config: CrawlConfig,
    filter: UrlFilter,
    link_selectors: Vec<scraper::Selector>,
    state: Mutex<CrawlState>,
    metrics: CrawlMetrics,
    emitter: Arc<dyn EventEmitter>,
    robots: RobotsCache,
    cancel: CancellationToken,
    pause_tx: watch::Sender<bool>,
    login_notify: Notify,
    awaiting_login: AtomicBool,
    status: RwLock<CrawlStatus>,
    active_workers: Arc<AtomicUsize>,
}

impl CrawlEngine {
    /// Construct an engine from a resolved configuration, a cancellation
    /// token, and an event emitter.
    pub fn new(
        config: CrawlConfig,
        cancel: CancellationToken,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<Self> {
        config.validate()?;

        let filter = UrlFilter::new(config.prefix_filter.as_deref(), &config.exclude_extensions)?;
        let link_selectors = config
            .link_selectors
            .iter()
            .map(|s| {
                scraper::Selector::parse(s)
                    .map_err(|e| anyhow::anyhow!("invalid link selector '{s}': {e}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let robots = RobotsCache::new(config.fetch_timeout)?;

        Ok(Self {
            config,
            filter,
            link_selectors,
            state: Mutex::new(CrawlState::default()),
            metrics: CrawlMetrics::new(),
            emitter,
            robots,
            cancel,
            pause_tx: watch::channel(false).0,
            login_notify: Notify::new(),
            awaiting_login: AtomicBool::new(false),
            status: RwLock::new(CrawlStatus::Pending),
            active_workers: Arc::new(AtomicUsize::new(0)),
        })
    }

    // ---- accessors shared with the page processor ----

    pub(super) fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub(super) fn filter(&self) -> &UrlFilter {
        &self.filter
    }

    pub(super) fn link_selectors(&self) -> &[scraper::Selector] {
        &self.link_selectors
    }

    pub(super) fn metrics(&self) -> &CrawlMetrics {
        &self.metrics
    }

    pub(super) fn robots(&self) -> &RobotsCache {
        &self.robots
    }

    pub(super) fn state_lock(&self) -> MutexGuard<'_, CrawlState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(super) fn emit(&self, event: CrawlEvent) {
        self.emitter.emit(event);
    }

    // ---- external control surface ----

    #[must_use]
    pub fn status(&self) -> CrawlStatus {
        *self.status.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Request a pause. Idempotent; a no-op once cancellation has begun
    /// (cancellation wins).
    pub fn pause(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let was_paused = self.pause_tx.send_replace(true);
        if !was_paused {
            self.set_status(CrawlStatus::Paused);
        }
    }

    /// Clear the pause flag and wake all waiters.
    pub fn resume(&self) {
        let was_paused = self.pause_tx.send_replace(false);
        if was_paused {
            self.set_status(CrawlStatus::Running);
        }
    }

    /// Confirm the operator finished logging in. Returns false when the
    /// engine is not waiting for a login.
    pub fn confirm_login(&self) -> bool {
        if !self.awaiting_login.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.emit(CrawlEvent::login_confirmed());
        self.login_notify.notify_one();
        true
    }

    fn set_status(&self, status: CrawlStatus) {
        *self.status.write().unwrap_or_else(std::sync::PoisonError::into_inner) = status;
        self.emit(CrawlEvent::state_changed(status));
    }

    /// Block while paused; cancellation wins over the pause gate.
    pub(super) async fn wait_if_paused(&self) {
        if !*self.pause_tx.borrow() {
            return;
        }
        let mut rx = self.pause_tx.subscribe();
        tokio::select! {
            () = self.cancel.cancelled() => {}
            _ = rx.wait_for(|paused| !*paused) => {}
        }
    }

    // ---- lifecycle ----

    /// Run the crawl to a terminal state.
    ///
    /// Fails when the output directory cannot be created, an existing state
    /// file cannot be loaded, or the fetcher fails to initialize. Per-URL
    /// failures are reported via events and never end the crawl.
    pub async fn start(self: Arc<Self>) -> Result<CrawlOutcome> {
        let started = Instant::now();

        let init = self.initialize().await;
        let fetcher = match init {
            Ok(fetcher) => fetcher,
            Err(e) => {
                self.set_status(CrawlStatus::Error);
                self.emit(CrawlEvent::error(None, format!("{e:#}")));
                return Err(e);
            }
        };

        self.set_status(CrawlStatus::Running);
        self.emit(CrawlEvent::crawl_started(
            self.config.seed_url.clone(),
            self.config.output_dir.clone(),
            self.config.max_depth,
        ));

        if self.config.wait_for_login {
            self.login_gate(fetcher.as_ref()).await;
        }

        let outcome = if self.cancel.is_cancelled() {
            CrawlOutcome::Stopped
        } else if self.config.concurrent {
            Arc::clone(&self).run_pool(Arc::clone(&fetcher)).await
        } else {
            self.run_single(&fetcher).await
        };

        self.checkpoint().await;
        fetcher.close().await;

        let snapshot = self.metrics.snapshot();
        match outcome {
            CrawlOutcome::Completed => {
                self.set_status(CrawlStatus::Completed);
                self.emit(CrawlEvent::crawl_completed(
                    snapshot.urls_processed,
                    snapshot.urls_saved,
                    started.elapsed(),
                ));
                log::info!("crawl completed: {}", snapshot.summary_line());
            }
            CrawlOutcome::Stopped => {
                self.set_status(CrawlStatus::Stopped);
                self.emit(CrawlEvent::crawl_stopped(snapshot.urls_processed));
                log::info!("crawl stopped after {} processed", snapshot.urls_processed);
            }
        }

        Ok(outcome)
    }

    /// Create the output directory, load or seed the durable state, and
    /// build the fetcher. All failures here are fatal.
    async fn initialize(&self) -> Result<Arc<dyn Fetcher>> {
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .with_context(|| {
                format!(
                    "failed to create output directory {}",
                    self.config.output_dir.display()
                )
            })?;

        let state = match CrawlState::load(&self.config.state_file).await? {
            Some(state) => {
                log::info!(
                    "resuming from {}: {} visited, {} queued",
                    self.config.state_file.display(),
                    state.visited_count(),
                    state.frontier_len()
                );
                state
            }
            None => {
                let seed = Url::parse(&self.config.seed_url)
                    .with_context(|| format!("invalid seed URL '{}'", self.config.seed_url))?;
                let canonical = if self.config.normalize_urls {
                    url_norm::normalize(&seed, self.config.lowercase_paths).into()
                } else {
                    seed.into()
                };
                CrawlState::seeded(canonical)
            }
        };
        self.metrics.set_queue_size(state.frontier_len() as u64);
        *self.state_lock() = state;

        let fetcher: Arc<dyn Fetcher> = match self.config.fetch_mode {
            FetchMode::Http => Arc::new(
                HttpFetcher::new(self.config.fetch_timeout)
                    .context("failed to initialize HTTP fetcher")?,
            ),
            FetchMode::Browser => Arc::new(
                BrowserFetcher::launch(
                    self.config.headless,
                    self.config.fetch_timeout,
                    self.config.pagination.clone(),
                    self.config.stealth.clone(),
                )
                .await
                .context("failed to initialize browser fetcher")?,
            ),
        };
        Ok(fetcher)
    }

    /// One-time operator handshake: navigate to the seed in the visible
    /// browser, announce it, and block until `confirm_login` (or cancel).
    async fn login_gate(&self, fetcher: &dyn Fetcher) {
        if let Ok(seed) = Url::parse(&self.config.seed_url)
            && let Err(e) = fetcher.fetch(&seed, &self.config.user_agent).await
        {
            log::warn!("preparatory navigation to {} failed: {e:#}", self.config.seed_url);
        }

        self.awaiting_login.store(true, Ordering::SeqCst);
        self.set_status(CrawlStatus::WaitingForLogin);
        self.emit(CrawlEvent::waiting_for_login(self.config.seed_url.clone()));
        log::info!("waiting for operator login at {}", self.config.seed_url);

        tokio::select! {
            () = self.cancel.cancelled() => {
                self.awaiting_login.store(false, Ordering::SeqCst);
            }
            () = self.login_notify.notified() => {
                self.set_status(CrawlStatus::Running);
            }
        }
    }

    /// Pop-side gates: skip already-visited entries and enforce the depth
    /// ceiling. Returns whether the entry should be processed.
    fn pop_gate(&self, entry: &FrontierEntry, already_visited: bool) -> bool {
        if already_visited {
            log::debug!("skipping visited frontier entry {}", entry.url);
            return false;
        }
        if entry.depth > self.config.max_depth {
            self.metrics.record_depth_limit_hit();
            self.emit(CrawlEvent::url_skipped(
                entry.url.clone(),
                crate::crawl_events::SkipReason::DepthLimit,
            ));
            return false;
        }
        true
    }

    async fn run_single(&self, fetcher: &Arc<dyn Fetcher>) -> CrawlOutcome {
        let mut last_checkpoint = self.state_lock().processed();

        loop {
            if self.cancel.is_cancelled() {
                return CrawlOutcome::Stopped;
            }
            self.wait_if_paused().await;
            if self.cancel.is_cancelled() {
                return CrawlOutcome::Stopped;
            }

            let (entry, already_visited) = {
                let mut state = self.state_lock();
                match state.pop_front() {
                    Some(entry) => {
                        let visited = state.is_visited(&entry.url);
                        self.metrics.set_queue_size(state.frontier_len() as u64);
                        (entry, visited)
                    }
                    None => return CrawlOutcome::Completed,
                }
            };

            if !self.pop_gate(&entry, already_visited) {
                continue;
            }

            self.process_url(fetcher.as_ref(), &entry).await;
            self.maybe_checkpoint(&mut last_checkpoint).await;

            tokio::select! {
                () = self.cancel.cancelled() => return CrawlOutcome::Stopped,
                () = tokio::time::sleep(self.config.delay) => {}
            }
        }
    }

    async fn run_pool(self: Arc<Self>, fetcher: Arc<dyn Fetcher>) -> CrawlOutcome {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut last_checkpoint = self.state_lock().processed();
        let mut outcome = CrawlOutcome::Completed;

        loop {
            if self.cancel.is_cancelled() {
                outcome = CrawlOutcome::Stopped;
                break;
            }
            self.wait_if_paused().await;
            if self.cancel.is_cancelled() {
                outcome = CrawlOutcome::Stopped;
                break;
            }

            self.maybe_checkpoint_quiesced(&mut last_checkpoint).await;

            let popped = {
                let mut state = self.state_lock();
                let popped = state.pop_front().map(|entry| {
                    let visited = state.is_visited(&entry.url);
                    (entry, visited)
                });
                self.metrics.set_queue_size(state.frontier_len() as u64);
                popped
            };

            let Some((entry, already_visited)) = popped else {
                // Active workers may still enqueue discoveries; terminate
                // only when the frontier and the pool are both empty.
                if self.active_workers.load(Ordering::SeqCst) == 0
                    && self.state_lock().frontier_len() == 0
                {
                    break;
                }
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        outcome = CrawlOutcome::Stopped;
                        break;
                    }
                    () = tokio::time::sleep(FRONTIER_IDLE_POLL) => {}
                }
                continue;
            };

            if !self.pop_gate(&entry, already_visited) {
                continue;
            }

            let permit = tokio::select! {
                () = self.cancel.cancelled() => {
                    outcome = CrawlOutcome::Stopped;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                }
            };

            self.active_workers.fetch_add(1, Ordering::SeqCst);
            let guard = WorkerGuard(Arc::clone(&self.active_workers));
            let engine = Arc::clone(&self);
            let fetcher = Arc::clone(&fetcher);

            tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;

                engine.wait_if_paused().await;
                let work = AssertUnwindSafe(engine.process_url(fetcher.as_ref(), &entry))
                    .catch_unwind()
                    .await;
                if work.is_err() {
                    engine.metrics.record_error();
                    engine.emit(CrawlEvent::error(
                        Some(entry.url.clone()),
                        "worker panicked while processing URL",
                    ));
                }

                if !engine.cancel.is_cancelled() {
                    tokio::select! {
                        () = engine.cancel.cancelled() => {}
                        () = tokio::time::sleep(engine.config.delay) => {}
                    }
                }
            });
        }

        self.drain_workers().await;
        outcome
    }

    /// Wait for in-flight workers to finish their current URL.
    async fn drain_workers(&self) {
        while self.active_workers.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }

    async fn maybe_checkpoint(&self, last_checkpoint: &mut u64) {
        let processed = self.state_lock().processed();
        if processed >= *last_checkpoint + self.config.checkpoint_interval {
            self.checkpoint().await;
            *last_checkpoint = processed;
        }
    }

    /// Pool-mode checkpoint: quiesce by waiting for active workers so the
    /// snapshot is consistent, then serialize.
    async fn maybe_checkpoint_quiesced(&self, last_checkpoint: &mut u64) {
        let processed = self.state_lock().processed();
        if processed < *last_checkpoint + self.config.checkpoint_interval {
            return;
        }
        self.drain_workers().await;
        self.checkpoint().await;
        *last_checkpoint = self.state_lock().processed();
    }

    /// Serialize the current state to the configured file. Checkpoint
    /// failures are reported but never fatal.
    async fn checkpoint(&self) {
        let snapshot = self.state_lock().clone();
        if let Err(e) = snapshot.save(&self.config.state_file).await {
            log::warn!("state checkpoint failed: {e:#}");
            self.emit(CrawlEvent::log("warn", format!("state checkpoint failed: {e:#}")));
        } else {
            log::debug!(
                "checkpointed {} processed to {}",
                snapshot.processed(),
                self.config.state_file.display()
            );
        }
    }
}

impl std::fmt::Debug for CrawlEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlEngine")
            .field("seed_url", &self.config.seed_url)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
