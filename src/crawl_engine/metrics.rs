//! Thread-safe crawl counters and derived rates.
//!
//! All counters are atomics requiring no lock; `snapshot()` reads them with
//! `SeqCst` so the relationships between fields stay coherent enough for
//! reporting.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct CrawlMetrics {
    urls_processed: AtomicU64,
    urls_saved: AtomicU64,
    urls_skipped: AtomicU64,
    urls_errored: AtomicU64,
    bytes_downloaded: AtomicU64,
    robots_blocked: AtomicU64,
    depth_limit_hits: AtomicU64,
    content_filtered: AtomicU64,
    queue_size: AtomicU64,
    started: Instant,
}

impl CrawlMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            urls_processed: AtomicU64::new(0),
            urls_saved: AtomicU64::new(0),
            urls_skipped: AtomicU64::new(0),
            urls_errored: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
            robots_blocked: AtomicU64::new(0),
            depth_limit_hits: AtomicU64::new(0),
            content_filtered: AtomicU64::new(0),
            queue_size: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_processed(&self) {
        self.urls_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_saved(&self, bytes: u64) {
        self.urls_saved.fetch_add(1, Ordering::SeqCst);
        self.bytes_downloaded.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn record_skipped(&self) {
        self.urls_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_error(&self) {
        self.urls_errored.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_robots_blocked(&self) {
        self.robots_blocked.fetch_add(1, Ordering::SeqCst);
        self.record_skipped();
    }

    pub fn record_depth_limit_hit(&self) {
        self.depth_limit_hits.fetch_add(1, Ordering::SeqCst);
        self.record_skipped();
    }

    pub fn record_content_filtered(&self) {
        self.content_filtered.fetch_add(1, Ordering::SeqCst);
        self.record_skipped();
    }

    pub fn set_queue_size(&self, size: u64) {
        self.queue_size.store(size, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let elapsed = self.started.elapsed().as_secs_f64();
        let processed = self.urls_processed.load(Ordering::SeqCst);
        MetricsSnapshot {
            urls_processed: processed,
            urls_saved: self.urls_saved.load(Ordering::SeqCst),
            urls_skipped: self.urls_skipped.load(Ordering::SeqCst),
            urls_errored: self.urls_errored.load(Ordering::SeqCst),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::SeqCst),
            robots_blocked: self.robots_blocked.load(Ordering::SeqCst),
            depth_limit_hits: self.depth_limit_hits.load(Ordering::SeqCst),
            content_filtered: self.content_filtered.load(Ordering::SeqCst),
            queue_size: self.queue_size.load(Ordering::SeqCst),
            elapsed_secs: elapsed,
            pages_per_second: if elapsed > 0.0 {
                processed as f64 / elapsed
            } else {
                0.0
            },
        }
    }
}

impl Default for CrawlMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the counters, plus derived rates.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub urls_processed: u64,
    pub urls_saved: u64,
    pub urls_skipped: u64,
    pub urls_errored: u64,
    pub bytes_downloaded: u64,
    pub robots_blocked: u64,
    pub depth_limit_hits: u64,
    pub content_filtered: u64,
    pub queue_size: u64,
    pub elapsed_secs: f64,
    pub pages_per_second: f64,
}

impl MetricsSnapshot {
    /// One-line human-readable summary for logs.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "{} processed, {} saved, {} skipped, {} errors, {:.1} KiB in {:.1}s ({:.2} pages/s)",
            self.urls_processed,
            self.urls_saved,
            self.urls_skipped,
            self.urls_errored,
            self.bytes_downloaded as f64 / 1024.0,
            self.elapsed_secs,
            self.pages_per_second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_categories_roll_up_into_skipped() {
        let metrics = CrawlMetrics::new();
        metrics.record_robots_blocked();
        metrics.record_depth_limit_hit();
        metrics.record_content_filtered();
        metrics.record_skipped();

        let snap = metrics.snapshot();
        assert_eq!(snap.urls_skipped, 4);
        assert_eq!(snap.robots_blocked, 1);
        assert_eq!(snap.depth_limit_hits, 1);
        assert_eq!(snap.content_filtered, 1);
    }

    #[test]
    fn saved_accumulates_bytes() {
        let metrics = CrawlMetrics::new();
        metrics.record_saved(100);
        metrics.record_saved(250);
        let snap = metrics.snapshot();
        assert_eq!(snap.urls_saved, 2);
        assert_eq!(snap.bytes_downloaded, 350);
    }
}
