//! webvault: an offline-backup web crawler.
//!
//! Given a seed URL, the crawl engine walks reachable pages breadth-first
//! with duplicate suppression and depth accounting, persists raw HTML plus
//! optional readable-content extraction and per-page metadata, and streams
//! typed events to any number of subscribers. A process-wide job manager
//! runs multiple crawls concurrently behind a lifecycle API that CLI,
//! desktop, HTTP, and agent front ends share.

pub mod config;
pub mod content_extractor;
pub mod content_saver;
pub mod crawl_engine;
pub mod crawl_events;
pub mod crawl_state;
pub mod fetcher;
pub mod job_manager;
pub mod robots;
pub mod utils;

pub use config::{CrawlConfig, CrawlRequest, FetchMode, PaginationConfig, StealthConfig};
pub use crawl_engine::{CrawlEngine, CrawlOutcome, CrawlStatus, MetricsSnapshot};
pub use crawl_events::{
    CrawlEvent, EventBroadcaster, EventEmitter, EventSubscription, FilteredSubscription,
    LogEmitter, NoOpEmitter, SkipReason,
};
pub use crawl_state::{CrawlState, FrontierEntry};
pub use fetcher::{BrowserFetcher, FetchResponse, Fetcher, HttpFetcher};
pub use job_manager::{Job, JobDetails, JobError, JobManager, JobSummary};
pub use robots::RobotsCache;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run a single crawl to completion with the given emitter.
///
/// Convenience wrapper for embedders that do not need the job manager;
/// returns how the crawl ended.
pub async fn crawl(
    config: CrawlConfig,
    cancel: CancellationToken,
    emitter: Arc<dyn EventEmitter>,
) -> anyhow::Result<CrawlOutcome> {
    let engine = Arc::new(CrawlEngine::new(config, cancel, emitter)?);
    engine.start().await
}
