use std::time::Duration;

use vox_api_env::{ElevenLabsEnv, SupabaseEnv, WorkerEnv};
use vox_elevenlabs::RetryConfig;

use crate::error::JobsApiError;

/// Allowance for download, spooling and persistence around the upstream call.
pub const JOB_OVERHEAD: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct JobsConfig {
    pub supabase: SupabaseEnv,
    pub elevenlabs: ElevenLabsEnv,
    pub worker: WorkerEnv,
}

impl JobsConfig {
    pub fn new(supabase: &SupabaseEnv, elevenlabs: &ElevenLabsEnv, worker: &WorkerEnv) -> Self {
        Self {
            supabase: supabase.clone(),
            elevenlabs: elevenlabs.clone(),
            worker: worker.clone(),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            num_retries: self.elevenlabs.elevenlabs_max_retries,
            ..Default::default()
        }
    }

    /// Longest a single job can stay in `processing` while still running.
    pub fn worst_case_job_time(&self) -> Duration {
        let retry = self.retry();
        let retries = u32::try_from(retry.num_retries).unwrap_or(u32::MAX);
        let timeout = Duration::from_secs(self.elevenlabs.elevenlabs_timeout_secs);

        timeout
            .saturating_mul(retries.saturating_add(1))
            .saturating_add(retry.max_delay.saturating_mul(retries))
            .saturating_add(JOB_OVERHEAD)
    }

    /// A job that can outlive the stuck window would be requeued and run
    /// twice while the first run is still in flight.
    pub fn check_stuck_window(&self) -> Result<(), JobsApiError> {
        let window = Duration::from_secs(self.worker.worker_stuck_minutes.saturating_mul(60));
        let worst_case = self.worst_case_job_time();

        if worst_case >= window {
            return Err(JobsApiError::Setup(format!(
                "WORKER_STUCK_MINUTES ({}) must exceed the worst-case job time of {} s \
                 (ELEVENLABS_TIMEOUT_SECS={}, ELEVENLABS_MAX_RETRIES={})",
                self.worker.worker_stuck_minutes,
                worst_case.as_secs(),
                self.elevenlabs.elevenlabs_timeout_secs,
                self.elevenlabs.elevenlabs_max_retries,
            )));
        }

        Ok(())
    }
}
