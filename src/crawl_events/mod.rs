//! Typed events crossing the engine boundary, the emitter capability, and
//! the fan-out broadcaster for external subscribers.

pub mod broadcaster;
pub mod emitter;
pub mod streaming;
pub mod types;

pub use broadcaster::{
    BroadcastMetrics, BroadcastMetricsSnapshot, EventBroadcaster, EventSubscription,
};
pub use emitter::{EventEmitter, LogEmitter, NoOpEmitter};
pub use streaming::FilteredSubscription;
pub use types::{CrawlEvent, ProgressData, SkipReason};
