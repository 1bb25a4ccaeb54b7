//! Event type definitions for the crawl event stream.
//!
//! Events are value objects crossing the engine boundary: a closed vocabulary
//! of types, each carrying a timestamp and a type-specific payload. On the
//! wire every event serializes as `{"type": ..., "timestamp": ..., "data": ...}`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::crawl_engine::status::CrawlStatus;

/// Why a URL was skipped rather than saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// robots.txt disallows this URL for the configured user agent.
    RobotsBlocked,
    /// The entry's depth exceeds the configured maximum.
    DepthLimit,
    /// Visible text shorter than the configured minimum.
    ContentFiltered,
    /// Response content type maps into the exclusion list.
    ContentTypeExcluded,
    /// Already processed by a concurrent worker.
    Duplicate,
    /// Non-success HTTP status.
    HttpStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStartedData {
    pub url: String,
    pub output_dir: PathBuf,
    pub max_depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlCompletedData {
    pub processed: u64,
    pub saved: u64,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStoppedData {
    pub processed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressData {
    pub processed: u64,
    pub saved: u64,
    pub skipped: u64,
    pub errors: u64,
    pub queue_size: u64,
    /// URL whose processing produced this update, when applicable.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogData {
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangedData {
    pub status: CrawlStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingForLoginData {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfirmedData {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub url: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlSavedData {
    pub url: String,
    pub path: PathBuf,
    pub size: u64,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlSkippedData {
    pub url: String,
    pub reason: SkipReason,
}

/// Events emitted during the crawl process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    CrawlStarted {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: CrawlStartedData,
    },
    CrawlCompleted {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: CrawlCompletedData,
    },
    CrawlStopped {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: CrawlStoppedData,
    },
    Progress {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: ProgressData,
    },
    Log {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: LogData,
    },
    StateChanged {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: StateChangedData,
    },
    WaitingForLogin {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: WaitingForLoginData,
    },
    LoginConfirmed {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: LoginConfirmedData,
    },
    Error {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: ErrorData,
    },
    UrlSaved {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: UrlSavedData,
    },
    UrlSkipped {
        timestamp: chrono::DateTime<chrono::Utc>,
        data: UrlSkippedData,
    },
}

/// Helper constructors; each stamps the current UTC time.
impl CrawlEvent {
    #[must_use]
    pub fn crawl_started(url: String, output_dir: PathBuf, max_depth: u32) -> Self {
        Self::CrawlStarted {
            timestamp: chrono::Utc::now(),
            data: CrawlStartedData {
                url,
                output_dir,
                max_depth,
            },
        }
    }

    #[must_use]
    pub fn crawl_completed(processed: u64, saved: u64, duration: std::time::Duration) -> Self {
        Self::CrawlCompleted {
            timestamp: chrono::Utc::now(),
            data: CrawlCompletedData {
                processed,
                saved,
                duration_secs: duration.as_secs_f64(),
            },
        }
    }

    #[must_use]
    pub fn crawl_stopped(processed: u64) -> Self {
        Self::CrawlStopped {
            timestamp: chrono::Utc::now(),
            data: CrawlStoppedData { processed },
        }
    }

    #[must_use]
    pub fn progress(data: ProgressData) -> Self {
        Self::Progress {
            timestamp: chrono::Utc::now(),
            data,
        }
    }

    #[must_use]
    pub fn log(level: &str, message: impl Into<String>) -> Self {
        Self::Log {
            timestamp: chrono::Utc::now(),
            data: LogData {
                level: level.to_string(),
                message: message.into(),
            },
        }
    }

    #[must_use]
    pub fn state_changed(status: CrawlStatus) -> Self {
        Self::StateChanged {
            timestamp: chrono::Utc::now(),
            data: StateChangedData { status },
        }
    }

    #[must_use]
    pub fn waiting_for_login(url: String) -> Self {
        Self::WaitingForLogin {
            timestamp: chrono::Utc::now(),
            data: WaitingForLoginData { url },
        }
    }

    #[must_use]
    pub fn login_confirmed() -> Self {
        Self::LoginConfirmed {
            timestamp: chrono::Utc::now(),
            data: LoginConfirmedData {},
        }
    }

    #[must_use]
    pub fn error(url: Option<String>, message: impl Into<String>) -> Self {
        Self::Error {
            timestamp: chrono::Utc::now(),
            data: ErrorData {
                url,
                message: message.into(),
            },
        }
    }

    #[must_use]
    pub fn url_saved(url: String, path: PathBuf, size: u64, depth: u32) -> Self {
        Self::UrlSaved {
            timestamp: chrono::Utc::now(),
            data: UrlSavedData {
                url,
                path,
                size,
                depth,
            },
        }
    }

    #[must_use]
    pub fn url_skipped(url: String, reason: SkipReason) -> Self {
        Self::UrlSkipped {
            timestamp: chrono::Utc::now(),
            data: UrlSkippedData { url, reason },
        }
    }

    /// Wire name of this event's type tag.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CrawlStarted { .. } => "crawl_started",
            Self::CrawlCompleted { .. } => "crawl_completed",
            Self::CrawlStopped { .. } => "crawl_stopped",
            Self::Progress { .. } => "progress",
            Self::Log { .. } => "log",
            Self::StateChanged { .. } => "state_changed",
            Self::WaitingForLogin { .. } => "waiting_for_login",
            Self::LoginConfirmed { .. } => "login_confirmed",
            Self::Error { .. } => "error",
            Self::UrlSaved { .. } => "url_saved",
            Self::UrlSkipped { .. } => "url_skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag_and_data() {
        let event = CrawlEvent::url_saved(
            "https://example.com/a".to_string(),
            PathBuf::from("out/a.html"),
            1234,
            1,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "url_saved");
        assert_eq!(json["data"]["url"], "https://example.com/a");
        assert_eq!(json["data"]["size"], 1234);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn skip_reasons_are_snake_case() {
        let event = CrawlEvent::url_skipped("https://example.com/x".into(), SkipReason::DepthLimit);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["reason"], "depth_limit");
    }
}
