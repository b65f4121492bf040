use crate::error::JobError;
use crate::handler::TranscriptionHandler;
use crate::store::JobStore;
use crate::transcriber::Transcriber;
use crate::types::{Job, JobType};

/// Routes a claimed job to the handler for its type.
pub struct Dispatcher<S, T> {
    transcription: TranscriptionHandler<S, T>,
}

impl<S, T> Clone for Dispatcher<S, T> {
    fn clone(&self) -> Self {
        Self {
            transcription: self.transcription.clone(),
        }
    }
}

impl<S: JobStore, T: Transcriber> Dispatcher<S, T> {
    pub fn new(transcription: TranscriptionHandler<S, T>) -> Self {
        Self { transcription }
    }

    pub async fn dispatch(&self, job: &Job) -> Result<serde_json::Value, JobError> {
        let job_type: JobType = job
            .job_type
            .parse()
            .map_err(|_| JobError::UnknownJobType(job.job_type.clone()))?;

        match job_type {
            JobType::Transcription => {
                let outcome = self.transcription.handle(job).await?;
                Ok(serde_json::json!(outcome))
            }
        }
    }
}
