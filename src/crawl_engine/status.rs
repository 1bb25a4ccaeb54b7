//! Crawl lifecycle states shared by the engine and the job manager.

use serde::{Deserialize, Serialize};

/// State machine: `pending → running ⇄ paused`,
/// `running → waiting_for_login → running`, and from any non-terminal state
/// into `stopped`, `completed`, or `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    /// Created but not yet started.
    Pending,
    Running,
    Paused,
    WaitingForLogin,
    /// Cancelled by the operator; final checkpoint flushed.
    Stopped,
    /// Frontier drained.
    Completed,
    /// Fatal initialization or runtime error.
    Error,
}

impl CrawlStatus {
    /// Active statuses count against the job manager's ceiling.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Running | Self::Paused | Self::WaitingForLogin
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

impl std::fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::WaitingForLogin => "waiting_for_login",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}
