//! Process-wide registry running multiple crawls concurrently.
//!
//! The manager enforces an active-job ceiling, translates external requests
//! into engine configuration, and owns every lifecycle transition:
//! create → start → pause/resume/login-confirm → stop/complete/error →
//! delete. Each operation rejects illegal transitions with a typed error.

pub mod error;
pub mod job;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

pub use error::JobError;
pub use job::{Job, JobDetails, JobSummary};

use crate::config::CrawlRequest;
use crate::crawl_engine::{CrawlEngine, CrawlOutcome, CrawlStatus, MetricsSnapshot};
use crate::crawl_events::{CrawlEvent, EventEmitter, EventSubscription};
use crate::utils::constants::DEFAULT_MAX_ACTIVE_JOBS;

pub struct JobManager {
    jobs: RwLock<HashMap<String, Arc<Job>>>,
    max_active: usize,
}

impl JobManager {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ACTIVE_JOBS)
    }

    /// A manager that rejects new jobs once `max_active` jobs are in an
    /// active status (`pending`, `running`, `paused`, `waiting_for_login`).
    #[must_use]
    pub fn with_capacity(max_active: usize) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            max_active: max_active.max(1),
        }
    }

    fn read_jobs(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Job>>> {
        self.jobs.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_jobs(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Job>>> {
        self.jobs.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn get_job(&self, id: &str) -> Result<Arc<Job>, JobError> {
        self.read_jobs()
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Validate and register a new job in `pending`.
    ///
    /// The request is translated to engine configuration up front so
    /// configuration errors surface synchronously, and the output directory
    /// is created eagerly.
    pub fn create(&self, request: CrawlRequest) -> Result<JobSummary, JobError> {
        let config = request
            .clone()
            .into_config()
            .map_err(|e| JobError::InvalidConfig(format!("{e:#}")))?;

        let mut jobs = self.write_jobs();
        let active = jobs.values().filter(|job| job.status().is_active()).count();
        if active >= self.max_active {
            return Err(JobError::TooManyActiveJobs {
                limit: self.max_active,
            });
        }

        std::fs::create_dir_all(&config.output_dir).map_err(|e| {
            JobError::InvalidConfig(format!(
                "cannot create output directory {}: {e}",
                config.output_dir.display()
            ))
        })?;

        let id = short_job_id();
        let job = Arc::new(Job::new(id.clone(), request, config));
        let summary = job.summary();
        jobs.insert(id, job);
        log::info!("created job {} for {}", summary.id, summary.url);
        Ok(summary)
    }

    /// Instantiate the engine and launch the background driver.
    ///
    /// The driver mirrors engine-initiated status changes into the job,
    /// records the terminal outcome, and closes the broadcaster on exit.
    pub fn start(&self, id: &str) -> Result<CrawlStatus, JobError> {
        let job = self.get_job(id)?;
        let engine = {
            let mut inner = job.lock();
            if inner.status != CrawlStatus::Pending {
                return Err(JobError::InvalidTransition {
                    id: id.to_string(),
                    actual: inner.status,
                    expected: "pending",
                });
            }

            let emitter: Arc<dyn EventEmitter> = Arc::new(job.broadcaster.clone());
            let engine = Arc::new(
                CrawlEngine::new(job.config.clone(), job.cancel.clone(), emitter)
                    .map_err(|e| JobError::InvalidConfig(format!("{e:#}")))?,
            );
            inner.engine = Some(Arc::clone(&engine));
            inner.status = CrawlStatus::Running;
            inner.started_at = Some(chrono::Utc::now());
            engine
        };

        // Mirror engine-driven transitions (waiting_for_login in particular)
        // into the job status.
        let mut subscription = job.broadcaster.subscribe();
        let tracker_job = Arc::clone(&job);
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if let CrawlEvent::StateChanged { data, .. } = event {
                    let mut inner = tracker_job.lock();
                    if !inner.status.is_terminal() {
                        inner.status = data.status;
                    }
                }
            }
        });

        let driver_job = Arc::clone(&job);
        tokio::spawn(async move {
            let result = engine.start().await;
            {
                let mut inner = driver_job.lock();
                match &result {
                    Ok(CrawlOutcome::Completed) => {
                        if !inner.status.is_terminal() {
                            inner.status = CrawlStatus::Completed;
                        }
                    }
                    Ok(CrawlOutcome::Stopped) => {
                        if !inner.status.is_terminal() {
                            inner.status = CrawlStatus::Stopped;
                        }
                    }
                    Err(e) => {
                        inner.status = CrawlStatus::Error;
                        inner.terminal_error = Some(format!("{e:#}"));
                    }
                }
                inner.completed_at = Some(chrono::Utc::now());
            }
            driver_job.broadcaster.close();
            log::info!("job {} finished as {}", driver_job.id, driver_job.status());
        });

        Ok(CrawlStatus::Running)
    }

    pub fn pause(&self, id: &str) -> Result<CrawlStatus, JobError> {
        let job = self.get_job(id)?;
        let mut inner = job.lock();
        if inner.status != CrawlStatus::Running {
            return Err(JobError::InvalidTransition {
                id: id.to_string(),
                actual: inner.status,
                expected: "running",
            });
        }
        if let Some(engine) = &inner.engine {
            engine.pause();
        }
        inner.status = CrawlStatus::Paused;
        Ok(CrawlStatus::Paused)
    }

    pub fn resume(&self, id: &str) -> Result<CrawlStatus, JobError> {
        let job = self.get_job(id)?;
        let mut inner = job.lock();
        if inner.status != CrawlStatus::Paused {
            return Err(JobError::InvalidTransition {
                id: id.to_string(),
                actual: inner.status,
                expected: "paused",
            });
        }
        if let Some(engine) = &inner.engine {
            engine.resume();
        }
        inner.status = CrawlStatus::Running;
        Ok(CrawlStatus::Running)
    }

    /// Cancel a job. In-flight fetches finish, the engine flushes a final
    /// checkpoint, and the driver closes the broadcaster once it exits.
    pub fn stop(&self, id: &str) -> Result<CrawlStatus, JobError> {
        let job = self.get_job(id)?;
        let mut inner = job.lock();
        match inner.status {
            CrawlStatus::Running | CrawlStatus::Paused | CrawlStatus::WaitingForLogin => {
                job.cancel.cancel();
                inner.status = CrawlStatus::Stopped;
                Ok(CrawlStatus::Stopped)
            }
            actual => Err(JobError::InvalidTransition {
                id: id.to_string(),
                actual,
                expected: "running, paused, or waiting_for_login",
            }),
        }
    }

    /// Wake the engine's login waiter.
    pub fn confirm_login(&self, id: &str) -> Result<CrawlStatus, JobError> {
        let job = self.get_job(id)?;
        let mut inner = job.lock();
        let confirmed = inner
            .engine
            .as_ref()
            .is_some_and(|engine| engine.confirm_login());
        if !confirmed {
            return Err(JobError::NotWaitingForLogin(id.to_string()));
        }
        inner.status = CrawlStatus::Running;
        Ok(CrawlStatus::Running)
    }

    /// Remove a job; valid only in terminal states.
    pub fn delete(&self, id: &str) -> Result<(), JobError> {
        let mut jobs = self.write_jobs();
        let job = jobs
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let status = job.status();
        if status.is_active() {
            return Err(JobError::InvalidTransition {
                id: id.to_string(),
                actual: status,
                expected: "a terminal status",
            });
        }
        job.broadcaster.close();
        jobs.remove(id);
        Ok(())
    }

    #[must_use]
    pub fn list(&self) -> Vec<JobSummary> {
        let mut summaries: Vec<JobSummary> =
            self.read_jobs().values().map(|job| job.summary()).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    pub fn get(&self, id: &str) -> Result<JobDetails, JobError> {
        Ok(self.get_job(id)?.details())
    }

    /// Latest metrics snapshot for a started job.
    pub fn metrics(&self, id: &str) -> Result<MetricsSnapshot, JobError> {
        let job = self.get_job(id)?;
        let inner = job.lock();
        inner
            .engine
            .as_ref()
            .map(|engine| engine.metrics_snapshot())
            .ok_or_else(|| JobError::NotStarted(id.to_string()))
    }

    /// Attach an event subscriber. Works mid-crawl; after completion the
    /// returned stream is already closed.
    pub fn subscribe(&self, id: &str) -> Result<EventSubscription, JobError> {
        Ok(self.get_job(id)?.broadcaster.subscribe())
    }

    /// Block until the job reaches a terminal state, polling at
    /// `poll_interval`, or fail once `timeout` elapses.
    pub async fn wait_for_completion(
        &self,
        id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<CrawlStatus, JobError> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.get_job(id)?.status();
            if status.is_terminal() {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(JobError::WaitTimeout(id.to_string()));
            }
            tokio::time::sleep(poll_interval.min(deadline - Instant::now())).await;
        }
    }

    /// Stop every active job and close every broadcaster.
    pub fn shutdown(&self) {
        let jobs: Vec<Arc<Job>> = self.read_jobs().values().cloned().collect();
        for job in jobs {
            {
                let mut inner = job.lock();
                if inner.status.is_active() {
                    job.cancel.cancel();
                    inner.status = CrawlStatus::Stopped;
                }
            }
            job.broadcaster.close();
        }
        log::info!("job manager shut down");
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.read_jobs().len())
            .field("max_active", &self.max_active)
            .finish()
    }
}

/// Short unique job token: eight characters of a UUIDv4.
fn short_job_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}
