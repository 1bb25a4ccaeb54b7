//! The event-emitter capability the engine depends on.
//!
//! `emit` is fire-and-forget: implementations must never block crawl
//! progress. The fan-out broadcaster implements this trait for external
//! subscribers; front ends that want direct dispatch (a desktop bridge, the
//! CLI) implement it differently.

use super::types::CrawlEvent;

/// Sink for engine events.
pub trait EventEmitter: Send + Sync {
    /// Deliver an event. Must not block.
    fn emit(&self, event: CrawlEvent);
}

/// Emitter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEmitter;

impl EventEmitter for NoOpEmitter {
    #[inline(always)]
    fn emit(&self, _event: CrawlEvent) {}
}

/// Emitter that routes events to the `log` facade, for CLI runs where no
/// subscriber is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmitter;

impl EventEmitter for LogEmitter {
    fn emit(&self, event: CrawlEvent) {
        match &event {
            CrawlEvent::Error { data, .. } => {
                log::error!("{} ({})", data.message, data.url.as_deref().unwrap_or("-"));
            }
            CrawlEvent::Log { data, .. } => match data.level.as_str() {
                "error" => log::error!("{}", data.message),
                "warn" => log::warn!("{}", data.message),
                "debug" => log::debug!("{}", data.message),
                _ => log::info!("{}", data.message),
            },
            CrawlEvent::UrlSaved { data, .. } => {
                log::info!("saved {} -> {}", data.url, data.path.display());
            }
            CrawlEvent::UrlSkipped { data, .. } => {
                log::debug!("skipped {} ({:?})", data.url, data.reason);
            }
            CrawlEvent::Progress { data, .. } => {
                log::debug!(
                    "progress: processed={} saved={} queued={}",
                    data.processed,
                    data.saved,
                    data.queue_size
                );
            }
            other => log::info!("{}", other.event_type()),
        }
    }
}
