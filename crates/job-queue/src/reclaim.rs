use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::JobError;
use crate::store::JobStore;
use crate::types::{Job, JobFilter, JobPatch, TranscriptionPatch, TranscriptionPayload};

pub const DEFAULT_STUCK_MINUTES: u64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReclaimReport {
    pub reset_count: usize,
    pub total_found: usize,
    pub failed_resets: usize,
    /// Stuck jobs that had no attempts left and were failed instead.
    pub exhausted: usize,
}

/// Returns jobs stranded in `processing` (crashed worker, lost write) to the
/// queue.
pub struct Reclaimer<S> {
    store: Arc<S>,
}

impl<S> Clone for Reclaimer<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: JobStore> Reclaimer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn reset_stuck_jobs(&self, max_time_minutes: u64) -> Result<ReclaimReport, JobError> {
        self.reset_stuck_jobs_at(max_time_minutes, Utc::now()).await
    }

    pub async fn reset_stuck_jobs_at(
        &self,
        max_time_minutes: u64,
        now: DateTime<Utc>,
    ) -> Result<ReclaimReport, JobError> {
        let cutoff = i64::try_from(max_time_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let stuck = self
            .store
            .list_jobs(&JobFilter::stuck(cutoff))
            .await
            .map_err(JobError::store("failed to list stuck jobs"))?;

        let mut report = ReclaimReport {
            total_found: stuck.len(),
            ..Default::default()
        };

        for job in &stuck {
            match self.reset_one(job, max_time_minutes, now).await {
                Ok(Reset::Requeued) => report.reset_count += 1,
                Ok(Reset::Exhausted) => report.exhausted += 1,
                Ok(Reset::MovedOn) => {}
                Err(error) => {
                    tracing::error!(job_id = %job.id, error = %error, "stuck_job_reset_failed");
                    report.failed_resets += 1;
                }
            }
        }

        if report.total_found > 0 {
            tracing::info!(
                total_found = report.total_found,
                reset_count = report.reset_count,
                exhausted = report.exhausted,
                failed_resets = report.failed_resets,
                "stuck_jobs_reclaimed"
            );
        }

        Ok(report)
    }

    async fn reset_one(
        &self,
        job: &Job,
        max_time_minutes: u64,
        now: DateTime<Utc>,
    ) -> Result<Reset, JobError> {
        let attempts = job.attempts.saturating_add(1);
        let message = format!("job exceeded {max_time_minutes} minutes in processing");
        let requeue = attempts <= job.max_attempts;

        // The exhausted row keeps its attempt count so it never reads above
        // `max_attempts`.
        let patch = if requeue {
            JobPatch::requeue(attempts, message.clone())
        } else {
            JobPatch::failed(format!("{message}; maximum attempts exceeded"), now)
        };

        let reset = self
            .store
            .reclaim_job(&job.id, job.started_at, &patch)
            .await
            .map_err(JobError::store("failed to update stuck job"))?;

        if reset.is_none() {
            tracing::info!(job_id = %job.id, "stuck_job_moved_on");
            return Ok(Reset::MovedOn);
        }

        // The transcription row follows the job; a job without a readable
        // payload has nothing to follow it.
        if let Ok(payload) = serde_json::from_value::<TranscriptionPayload>(job.payload.clone()) {
            let transcription_patch = if requeue {
                TranscriptionPatch::requeued(message)
            } else {
                TranscriptionPatch::failed(message)
            };
            if let Err(error) = self
                .store
                .update_transcription(&payload.transcription_id, &transcription_patch)
                .await
            {
                tracing::warn!(
                    job_id = %job.id,
                    transcription_id = %payload.transcription_id,
                    error = %error,
                    "stuck_transcription_reset_failed"
                );
            }
        }

        tracing::warn!(
            job_id = %job.id,
            attempts,
            max_attempts = job.max_attempts,
            requeued = requeue,
            "stuck_job_reset"
        );

        Ok(if requeue {
            Reset::Requeued
        } else {
            Reset::Exhausted
        })
    }
}

enum Reset {
    Requeued,
    Exhausted,
    /// Finished or re-claimed between the listing and the reset.
    MovedOn,
}
