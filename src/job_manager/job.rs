//! One crawl instance owned by the job manager.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::config::{CrawlConfig, CrawlRequest};
use crate::crawl_engine::{CrawlEngine, CrawlStatus, MetricsSnapshot};
use crate::crawl_events::EventBroadcaster;

/// Mutable job fields, guarded by the job's own lock. Lock ordering is
/// registry → job; nothing here calls back into the manager.
pub(super) struct JobInner {
    pub(super) status: CrawlStatus,
    pub(super) started_at: Option<DateTime<Utc>>,
    pub(super) completed_at: Option<DateTime<Utc>>,
    pub(super) terminal_error: Option<String>,
    pub(super) engine: Option<Arc<CrawlEngine>>,
}

/// A registered crawl: immutable identity plus lifecycle state.
pub struct Job {
    pub id: String,
    /// The external request as received, kept for audit.
    pub request: CrawlRequest,
    pub created_at: DateTime<Utc>,
    pub(super) config: CrawlConfig,
    pub(super) inner: Mutex<JobInner>,
    pub(super) broadcaster: EventBroadcaster,
    pub(super) cancel: CancellationToken,
}

impl Job {
    pub(super) fn new(id: String, request: CrawlRequest, config: CrawlConfig) -> Self {
        Self {
            id,
            request,
            created_at: Utc::now(),
            config,
            inner: Mutex::new(JobInner {
                status: CrawlStatus::Pending,
                started_at: None,
                completed_at: None,
                terminal_error: None,
                engine: None,
            }),
            broadcaster: EventBroadcaster::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, JobInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn status(&self) -> CrawlStatus {
        self.lock().status
    }

    #[must_use]
    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    #[must_use]
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            url: self.request.url.clone(),
            status: self.status(),
            created_at: self.created_at,
        }
    }

    #[must_use]
    pub fn details(&self) -> JobDetails {
        let inner = self.lock();
        JobDetails {
            id: self.id.clone(),
            url: self.request.url.clone(),
            status: inner.status,
            created_at: self.created_at,
            started_at: inner.started_at,
            completed_at: inner.completed_at,
            error: inner.terminal_error.clone(),
            metrics: inner.engine.as_ref().map(|e| e.metrics_snapshot()),
        }
    }
}

/// Listing row: identity and coarse status.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub url: String,
    pub status: CrawlStatus,
    pub created_at: DateTime<Utc>,
}

/// Full job view, including the latest metrics snapshot once started.
#[derive(Debug, Clone, Serialize)]
pub struct JobDetails {
    pub id: String,
    pub url: String,
    pub status: CrawlStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub metrics: Option<MetricsSnapshot>,
}
