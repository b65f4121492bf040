use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::Instrument;

use vox_elevenlabs::TranscribeOptions;

use crate::error::JobError;
use crate::segments::{SegmentConfig, build_segments, duration_secs, word_count};
use crate::store::JobStore;
use crate::transcriber::Transcriber;
use crate::types::{
    Job, ProgressStage, SegmentRow, TranscriptionPatch, TranscriptionPayload, TranscriptionStatus,
};

pub const DEFAULT_DOWNLOAD_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionOutcome {
    pub success: bool,
    pub transcription_id: String,
    pub file_id: String,
    pub duration: f64,
    pub word_count: usize,
    pub segment_count: usize,
    pub language: String,
}

pub struct TranscriptionHandler<S, T> {
    store: Arc<S>,
    transcriber: Arc<T>,
    segments: SegmentConfig,
    download_ttl_secs: u64,
}

impl<S, T> Clone for TranscriptionHandler<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            transcriber: self.transcriber.clone(),
            segments: self.segments.clone(),
            download_ttl_secs: self.download_ttl_secs,
        }
    }
}

impl<S: JobStore, T: Transcriber> TranscriptionHandler<S, T> {
    pub fn new(store: Arc<S>, transcriber: Arc<T>) -> Self {
        Self {
            store,
            transcriber,
            segments: SegmentConfig::default(),
            download_ttl_secs: DEFAULT_DOWNLOAD_TTL_SECS,
        }
    }

    pub fn with_segments(mut self, segments: SegmentConfig) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_download_ttl(mut self, ttl_secs: u64) -> Self {
        self.download_ttl_secs = ttl_secs;
        self
    }

    /// Runs the pipeline for one claimed job. On any failure after the
    /// payload is parsed, the transcription row is marked failed before the
    /// error is returned.
    pub async fn handle(&self, job: &Job) -> Result<TranscriptionOutcome, JobError> {
        let payload: TranscriptionPayload =
            serde_json::from_value(job.payload.clone()).map_err(JobError::InvalidPayload)?;

        let span = tracing::info_span!(
            "transcription_job",
            job_id = %job.id,
            transcription_id = %payload.transcription_id,
            file_id = %payload.file_id,
        );

        async {
            match self.run(&payload).await {
                Ok(outcome) => {
                    tracing::info!(
                        word_count = outcome.word_count,
                        segment_count = outcome.segment_count,
                        duration = outcome.duration,
                        "transcription_completed"
                    );
                    Ok(outcome)
                }
                Err(error) => {
                    tracing::error!(error = %error, "transcription_failed");
                    self.mark_failed(&payload.transcription_id, &error).await;
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, payload: &TranscriptionPayload) -> Result<TranscriptionOutcome, JobError> {
        let transcription_id = payload.transcription_id.as_str();

        self.store
            .update_transcription(
                transcription_id,
                &TranscriptionPatch::status(TranscriptionStatus::Processing),
            )
            .await
            .map_err(JobError::store("failed to mark transcription processing"))?;

        self.set_progress(transcription_id, ProgressStage::Downloading)
            .await;
        let storage_path = self.resolve_storage_path(payload).await?;
        let url = self
            .store
            .signed_download_url(&storage_path, self.download_ttl_secs)
            .await
            .map_err(JobError::store("failed to sign download url"))?;
        let audio = self
            .store
            .download(&url)
            .await
            .map_err(JobError::store("failed to download audio"))?;
        tracing::debug!(bytes = audio.len(), "audio_downloaded");

        // Removed on drop, on every exit path.
        let spooled = spool_audio(&audio, &storage_path)?;
        drop(audio);

        self.set_progress(transcription_id, ProgressStage::Transcribing)
            .await;
        let options = TranscribeOptions {
            language: payload.language.clone(),
            diarize: payload.diarize,
            num_speakers: payload.num_speakers,
            timestamps_granularity: payload.timestamps_granularity,
            tag_audio_events: payload.tag_audio_events,
        };
        let response = self
            .transcriber
            .transcribe_audio(spooled.path(), &options)
            .await
            .map_err(|e| JobError::Transcription(e.to_string()))?;
        drop(spooled);

        if payload.diarize {
            self.set_progress(transcription_id, ProgressStage::Diarizing)
                .await;
        }
        let rows: Vec<SegmentRow> = build_segments(&response.words, &self.segments)
            .into_iter()
            .map(|segment| segment.into_row(transcription_id))
            .collect();

        self.set_progress(transcription_id, ProgressStage::Finalizing)
            .await;
        self.store
            .delete_segments(transcription_id)
            .await
            .map_err(JobError::store("failed to clear previous segments"))?;
        if !rows.is_empty() {
            self.store
                .insert_segments(&rows)
                .await
                .map_err(JobError::store("failed to insert segments"))?;
        }

        let finalize = TranscriptionPatch {
            status: Some(TranscriptionStatus::Completed),
            language: Some(response.language_code.clone()),
            language_probability: Some(response.language_probability),
            raw_text: Some(response.text.clone()),
            error_message: Some(None),
            progress_stage: Some(None),
        };
        self.store
            .update_transcription(transcription_id, &finalize)
            .await
            .map_err(|source| JobError::PartialWrite {
                transcription_id: transcription_id.to_string(),
                segment_count: rows.len(),
                source,
            })?;

        Ok(TranscriptionOutcome {
            success: true,
            transcription_id: payload.transcription_id.clone(),
            file_id: payload.file_id.clone(),
            duration: duration_secs(&response.words),
            word_count: word_count(&response.words),
            segment_count: rows.len(),
            language: response.language_code,
        })
    }

    async fn resolve_storage_path(&self, payload: &TranscriptionPayload) -> Result<String, JobError> {
        if let Some(path) = payload.file_path.as_ref().filter(|p| !p.is_empty()) {
            return Ok(path.clone());
        }

        let file = self
            .store
            .get_file(&payload.file_id)
            .await
            .map_err(JobError::store("failed to load file record"))?
            .ok_or_else(|| JobError::FileNotFound(payload.file_id.clone()))?;

        Ok(file.storage_path)
    }

    async fn set_progress(&self, transcription_id: &str, stage: ProgressStage) {
        if let Err(error) = self
            .store
            .update_transcription(transcription_id, &TranscriptionPatch::progress(stage))
            .await
        {
            tracing::warn!(error = %error, stage = ?stage, "progress_update_failed");
        }
    }

    async fn mark_failed(&self, transcription_id: &str, error: &JobError) {
        if let Err(store_error) = self
            .store
            .update_transcription(transcription_id, &TranscriptionPatch::failed(error.to_string()))
            .await
        {
            tracing::error!(error = %store_error, "transcription_mark_failed_failed");
        }
    }
}

fn spool_audio(audio: &Bytes, storage_path: &str) -> Result<tempfile::NamedTempFile, std::io::Error> {
    let extension = Path::new(storage_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");

    let mut temp_file = tempfile::Builder::new()
        .prefix("job_audio_")
        .suffix(&format!(".{}", extension))
        .tempfile()?;

    temp_file.write_all(audio)?;
    temp_file.flush()?;

    Ok(temp_file)
}
