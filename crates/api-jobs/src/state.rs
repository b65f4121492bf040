use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vox_elevenlabs::ElevenLabsClient;
use vox_job_queue::{Dispatcher, TranscriptionHandler, Worker, WorkerConfig, WorkerSummary};
use vox_supabase_store::SupabaseClient;

use crate::config::JobsConfig;
use crate::error::JobsApiError;

pub(crate) type JobWorker = Worker<SupabaseClient, ElevenLabsClient>;

struct BackgroundWorker {
    cancel: CancellationToken,
    handle: JoinHandle<WorkerSummary>,
}

/// Shared by the router and the binary. At most one continuous worker loop
/// runs per process.
#[derive(Clone)]
pub struct JobsState {
    pub(crate) config: JobsConfig,
    pub(crate) supabase: SupabaseClient,
    pub(crate) worker: JobWorker,
    background: Arc<Mutex<Option<BackgroundWorker>>>,
}

impl JobsState {
    pub fn new(config: JobsConfig) -> Result<Self, JobsApiError> {
        config.check_stuck_window()?;

        let supabase = SupabaseClient::new(
            &config.supabase.supabase_url,
            &config.supabase.supabase_service_role_key,
        )
        .map_err(|e| JobsApiError::Setup(e.to_string()))?
        .with_anon_key(&config.supabase.supabase_anon_key)
        .with_audio_bucket(&config.supabase.supabase_audio_bucket);

        let elevenlabs = ElevenLabsClient::builder()
            .api_base(&config.elevenlabs.elevenlabs_api_base)
            .api_key(&config.elevenlabs.elevenlabs_api_key)
            .model_id(&config.elevenlabs.elevenlabs_model_id)
            .timeout(Duration::from_secs(config.elevenlabs.elevenlabs_timeout_secs))
            .retry(config.retry())
            .build()
            .map_err(|e| JobsApiError::Setup(e.to_string()))?;

        let store = Arc::new(supabase.clone());
        let handler = TranscriptionHandler::new(store.clone(), Arc::new(elevenlabs));
        let worker = Worker::new(
            store,
            Dispatcher::new(handler),
            WorkerConfig {
                max_jobs: config.worker.worker_max_jobs,
                poll_interval: Duration::from_secs(config.worker.worker_poll_interval_secs),
                reclaim_after_minutes: Some(config.worker.worker_stuck_minutes),
            },
        );

        Ok(Self {
            config,
            supabase,
            worker,
            background: Arc::default(),
        })
    }

    /// Returns `false` if a loop was already running.
    pub async fn start_background(&self, max_jobs: Option<usize>) -> bool {
        let mut background = self.background.lock().await;
        if background
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
        {
            return false;
        }

        let cancel = CancellationToken::new();
        let worker = match max_jobs {
            Some(max_jobs) => self.worker.clone().with_max_jobs(max_jobs),
            None => self.worker.clone(),
        };
        let token = cancel.clone();
        let handle = tokio::spawn(async move { worker.run_continuous(token).await });

        *background = Some(BackgroundWorker { cancel, handle });
        true
    }

    /// Cancels the loop and waits for the job in flight to finish.
    pub async fn stop_background(&self) -> Option<WorkerSummary> {
        let running = self.background.lock().await.take()?;
        running.cancel.cancel();

        match running.handle.await {
            Ok(summary) => Some(summary),
            Err(error) => {
                tracing::error!(error = %error, "background_worker_join_failed");
                None
            }
        }
    }
}
