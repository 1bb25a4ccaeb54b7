//! Typed errors for the job-manager API surface.

use crate::crawl_engine::CrawlStatus;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The active-job ceiling is already reached.
    #[error("too many active jobs (limit {limit})")]
    TooManyActiveJobs { limit: usize },

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A lifecycle operation was applied in the wrong status.
    #[error("job {id} is {actual}, expected {expected}")]
    InvalidTransition {
        id: String,
        actual: CrawlStatus,
        expected: &'static str,
    },

    #[error("job {0} is not waiting for login")]
    NotWaitingForLogin(String),

    #[error("job {0} has not been started")]
    NotStarted(String),

    #[error("timed out waiting for job {0} to reach a terminal state")]
    WaitTimeout(String),
}
