//! Shared configuration constants for webvault
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

use std::time::Duration;

/// Default user agent sent with every request
///
/// Identifies the crawler honestly while remaining close enough to a real
/// browser string that most servers serve the normal desktop markup.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; webvault/0.4; +https://github.com/webvault/webvault)";

/// Default maximum crawl depth: 10 levels
///
/// Depth is discovery distance from the seed, not URL-path depth. Ten levels
/// captures essentially any reachable page on a typical site while still
/// bounding pathological link mazes.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Default delay between requests
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(1);

/// Default per-request fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Worker ceiling for the concurrent crawl mode
///
/// Caps the blast radius of slow servers: a stalled fetch ties up one permit,
/// never the whole crawl.
pub const DEFAULT_WORKER_CEILING: usize = 10;

/// Minimum visible-text length for a page to be saved
pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 100;

/// Checkpoint the durable state every N processed URLs
pub const CHECKPOINT_INTERVAL: u64 = 10;

/// Poll interval while the frontier is empty but workers are still active
pub const FRONTIER_IDLE_POLL: Duration = Duration::from_millis(100);

/// Default CSS selector for link discovery
pub const DEFAULT_LINK_SELECTOR: &str = "a[href]";

/// Redirect ceiling for both fetcher implementations
pub const MAX_REDIRECTS: usize = 10;

/// Default cap on pagination clicks in browser mode
pub const DEFAULT_MAX_PAGINATION_CLICKS: u32 = 100;

/// Bounded queue capacity for each event subscriber
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

/// Default ceiling on simultaneously active jobs in the job manager
pub const DEFAULT_MAX_ACTIVE_JOBS: usize = 5;

/// Length cap for output directory names derived from the seed URL
pub const DERIVED_DIR_NAME_CAP: usize = 100;
