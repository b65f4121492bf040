use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::dispatcher::Dispatcher;
use crate::error::JobError;
use crate::reclaim::Reclaimer;
use crate::store::JobStore;
use crate::transcriber::Transcriber;
use crate::types::{Job, JobFilter, JobPatch};

pub const DEFAULT_MAX_JOBS: usize = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub max_jobs: usize,
    pub poll_interval: Duration,
    /// When set, continuous mode reclaims jobs stuck longer than this many
    /// minutes before every poll.
    pub reclaim_after_minutes: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_jobs: DEFAULT_MAX_JOBS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reclaim_after_minutes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: String,
    pub job_type: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct WorkerReport {
    pub processed: usize,
    pub results: Vec<JobReport>,
}

impl WorkerReport {
    fn push(&mut self, report: JobReport) {
        self.processed += 1;
        self.results.push(report);
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// Running totals of a continuous worker. Per-job results are logged as they
/// happen and then dropped, so a long-lived loop holds constant memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct WorkerSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl WorkerSummary {
    fn record(&mut self, report: &WorkerReport) {
        let succeeded = report.succeeded();
        self.processed += report.processed;
        self.succeeded += succeeded;
        self.failed += report.processed - succeeded;
    }
}

pub struct Worker<S, T> {
    store: Arc<S>,
    dispatcher: Dispatcher<S, T>,
    reclaimer: Reclaimer<S>,
    config: WorkerConfig,
}

impl<S, T> Clone for Worker<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            reclaimer: self.reclaimer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: JobStore, T: Transcriber> Worker<S, T> {
    pub fn new(store: Arc<S>, dispatcher: Dispatcher<S, T>, config: WorkerConfig) -> Self {
        Self {
            reclaimer: Reclaimer::new(store.clone()),
            store,
            dispatcher,
            config,
        }
    }

    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.config.max_jobs = max_jobs;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn reclaimer(&self) -> &Reclaimer<S> {
        &self.reclaimer
    }

    /// Claims and runs up to `max_jobs` pending jobs, oldest first, one at a
    /// time.
    pub async fn run_batch(&self, max_jobs: usize) -> Result<WorkerReport, JobError> {
        let jobs = self
            .store
            .list_jobs(&JobFilter::pending(max_jobs))
            .await
            .map_err(JobError::store("failed to list pending jobs"))?;

        tracing::debug!(found = jobs.len(), max_jobs, "pending_jobs_listed");

        let mut report = WorkerReport::default();
        for job in jobs.into_iter().take(max_jobs) {
            if let Some(job_report) = self.process(job).await {
                report.push(job_report);
            }
        }

        Ok(report)
    }

    /// Polls until `cancel` fires. Cancellation is observed between batches
    /// and during the sleep, never in the middle of a job.
    pub async fn run_continuous(&self, cancel: CancellationToken) -> WorkerSummary {
        let mut total = WorkerSummary::default();

        tracing::info!(
            max_jobs = self.config.max_jobs,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "continuous_worker_started"
        );

        while !cancel.is_cancelled() {
            if let Some(minutes) = self.config.reclaim_after_minutes {
                if let Err(error) = self.reclaimer.reset_stuck_jobs(minutes).await {
                    tracing::error!(error = %error, "stuck_job_reclaim_failed");
                }
            }

            match self.run_batch(self.config.max_jobs).await {
                Ok(report) => {
                    if report.processed > 0 {
                        tracing::info!(
                            processed = report.processed,
                            succeeded = report.succeeded(),
                            "worker_batch_finished"
                        );
                    }
                    total.record(&report);
                }
                Err(error) => tracing::error!(error = %error, "worker_batch_failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!(
            processed = total.processed,
            succeeded = total.succeeded,
            failed = total.failed,
            "continuous_worker_stopped"
        );
        total
    }

    async fn process(&self, job: Job) -> Option<JobReport> {
        if job.attempts >= job.max_attempts {
            return self.fail_exhausted(job).await;
        }

        let claim = JobPatch::claim(job.attempts.saturating_add(1), Utc::now());
        let claimed = match self.store.claim_job(&job.id, &claim).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                tracing::debug!(job_id = %job.id, "job_already_claimed");
                return None;
            }
            Err(error) => {
                tracing::warn!(job_id = %job.id, error = %error, "job_claim_failed");
                return None;
            }
        };

        tracing::info!(
            job_id = %claimed.id,
            job_type = %claimed.job_type,
            attempts = claimed.attempts,
            "job_claimed"
        );

        let outcome = AssertUnwindSafe(self.dispatcher.dispatch(&claimed))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(JobError::Panicked(panic_message(panic))));

        let (patch, report) = match outcome {
            Ok(result) => (
                JobPatch::completed(result.clone(), Utc::now()),
                JobReport {
                    job_id: claimed.id.clone(),
                    job_type: claimed.job_type.clone(),
                    success: true,
                    result: Some(result),
                    error: None,
                },
            ),
            Err(error) => {
                let message = error.to_string();
                tracing::error!(job_id = %claimed.id, error = %message, "job_failed");
                (
                    JobPatch::failed(message.clone(), Utc::now()),
                    JobReport {
                        job_id: claimed.id.clone(),
                        job_type: claimed.job_type.clone(),
                        success: false,
                        result: None,
                        error: Some(message),
                    },
                )
            }
        };

        // A lost terminal write leaves the job in `processing`; the reclaimer
        // picks it up later.
        if let Err(error) = self.store.update_job(&claimed.id, &patch).await {
            tracing::error!(job_id = %claimed.id, error = %error, "job_finalize_failed");
        }

        Some(report)
    }

    async fn fail_exhausted(&self, job: Job) -> Option<JobReport> {
        let error = JobError::MaxAttemptsExceeded {
            attempts: job.attempts,
            max_attempts: job.max_attempts,
        };
        let message = error.to_string();

        match self
            .store
            .claim_job(&job.id, &JobPatch::failed(message.clone(), Utc::now()))
            .await
        {
            Ok(Some(_)) => {
                tracing::warn!(job_id = %job.id, attempts = job.attempts, "job_attempts_exhausted");
                Some(JobReport {
                    job_id: job.id,
                    job_type: job.job_type,
                    success: false,
                    result: None,
                    error: Some(message),
                })
            }
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(job_id = %job.id, error = %error, "job_claim_failed");
                None
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
