#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use job_queue::{
    Dispatcher, FileRecord, Job, JobFilter, JobPatch, JobStatus, JobStore, ProgressStage,
    SegmentRow, StoreError, TranscribeError, Transcriber, TranscriptionHandler,
    TranscriptionPatch, TranscriptionStatus, Worker, WorkerConfig,
};
use vox_elevenlabs::{TranscribeOptions, TranscriptionResponse, Word};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptionRow {
    pub status: Option<TranscriptionStatus>,
    pub language: Option<String>,
    pub language_probability: Option<f64>,
    pub raw_text: Option<String>,
    pub error_message: Option<String>,
    pub progress_stage: Option<ProgressStage>,
}

#[derive(Default)]
pub struct StoreState {
    pub jobs: Vec<Job>,
    pub transcriptions: HashMap<String, TranscriptionRow>,
    pub segments: Vec<SegmentRow>,
    pub files: HashMap<String, FileRecord>,
    pub objects: HashMap<String, Bytes>,
    pub progress: Vec<(String, ProgressStage)>,
    pub lose_claims: HashSet<String>,
    /// Jobs that another worker finishes right before the reclaimer's write.
    pub complete_before_reclaim: HashSet<String>,
    pub fail_finalize: bool,
    pub fail_segment_insert: bool,
}

/// Job store backed by plain collections, mirroring the conditional-update
/// semantics of the PostgREST store.
#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_job(&self, job: Job) {
        self.state.lock().unwrap().jobs.push(job);
    }

    pub fn add_file(&self, id: &str, storage_path: &str, audio: &'static [u8]) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(
            id.to_string(),
            FileRecord {
                id: id.to_string(),
                storage_path: storage_path.to_string(),
                file_name: None,
                mime_type: None,
            },
        );
        state
            .objects
            .insert(storage_path.to_string(), Bytes::from_static(audio));
    }

    pub fn job(&self, id: &str) -> Job {
        self.state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .unwrap()
    }

    pub fn transcription(&self, id: &str) -> TranscriptionRow {
        self.state
            .lock()
            .unwrap()
            .transcriptions
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn segments(&self, transcription_id: &str) -> Vec<SegmentRow> {
        self.state
            .lock()
            .unwrap()
            .segments
            .iter()
            .filter(|s| s.transcription_id == transcription_id)
            .cloned()
            .collect()
    }

    pub fn progress(&self, transcription_id: &str) -> Vec<ProgressStage> {
        self.state
            .lock()
            .unwrap()
            .progress
            .iter()
            .filter(|(id, _)| id == transcription_id)
            .map(|(_, stage)| *stage)
            .collect()
    }
}

fn apply_job_patch(job: &mut Job, patch: &JobPatch) {
    if let Some(status) = patch.status {
        job.status = status;
    }
    if let Some(attempts) = patch.attempts {
        job.attempts = attempts;
    }
    if let Some(started_at) = patch.started_at {
        job.started_at = started_at;
    }
    if let Some(completed_at) = patch.completed_at {
        job.completed_at = completed_at;
    }
    if let Some(result) = &patch.result {
        job.result = (!result.is_null()).then(|| result.clone());
    }
    if let Some(error_message) = &patch.error_message {
        job.error_message = error_message.clone();
    }
}

impl JobStore for MemoryStore {
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut jobs: Vec<Job> = state
            .jobs
            .iter()
            .filter(|j| filter.status.is_none_or(|s| j.status == s))
            .filter(|j| filter.job_type.as_ref().is_none_or(|t| &j.job_type == t))
            .filter(|j| {
                filter.transcription_id.as_ref().is_none_or(|id| {
                    j.payload.get("transcription_id").and_then(|v| v.as_str()) == Some(id)
                })
            })
            .filter(|j| {
                filter
                    .started_before
                    .is_none_or(|cutoff| j.started_at.is_some_and(|s| s < cutoff))
            })
            .cloned()
            .collect();

        jobs.sort_by_key(|j| j.created_at);
        if let Some(limit) = filter.limit {
            jobs.truncate(limit);
        }
        Ok(jobs)
    }

    async fn claim_job(&self, id: &str, patch: &JobPatch) -> Result<Option<Job>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.lose_claims.contains(id) {
            return Ok(None);
        }
        let Some(job) = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id && j.status == JobStatus::Pending)
        else {
            return Ok(None);
        };
        apply_job_patch(job, patch);
        Ok(Some(job.clone()))
    }

    async fn reclaim_job(
        &self,
        id: &str,
        started_at: Option<DateTime<Utc>>,
        patch: &JobPatch,
    ) -> Result<Option<Job>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.complete_before_reclaim.contains(id) {
            if let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) {
                apply_job_patch(
                    job,
                    &JobPatch::completed(serde_json::json!({ "success": true }), Utc::now()),
                );
            }
        }
        let Some(job) = state.jobs.iter_mut().find(|j| {
            j.id == id && j.status == JobStatus::Processing && j.started_at == started_at
        }) else {
            return Ok(None);
        };
        apply_job_patch(job, patch);
        Ok(Some(job.clone()))
    }

    async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or("job not found")?;
        apply_job_patch(job, patch);
        Ok(())
    }

    async fn delete_segments(&self, transcription_id: &str) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .segments
            .retain(|s| s.transcription_id != transcription_id);
        Ok(())
    }

    async fn insert_segments(&self, rows: &[SegmentRow]) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_segment_insert {
            return Err("segment insert rejected".into());
        }
        state.segments.extend_from_slice(rows);
        Ok(())
    }

    async fn update_transcription(
        &self,
        id: &str,
        patch: &TranscriptionPatch,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_finalize && patch.status == Some(TranscriptionStatus::Completed) {
            return Err("transcription update rejected".into());
        }
        if let Some(Some(stage)) = patch.progress_stage {
            state.progress.push((id.to_string(), stage));
        }

        let row = state.transcriptions.entry(id.to_string()).or_default();
        if let Some(status) = patch.status {
            row.status = Some(status);
        }
        if let Some(language) = &patch.language {
            row.language = Some(language.clone());
        }
        if let Some(probability) = patch.language_probability {
            row.language_probability = Some(probability);
        }
        if let Some(raw_text) = &patch.raw_text {
            row.raw_text = Some(raw_text.clone());
        }
        if let Some(error_message) = &patch.error_message {
            row.error_message = error_message.clone();
        }
        if let Some(stage) = patch.progress_stage {
            row.progress_stage = stage;
        }
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.state.lock().unwrap().files.get(file_id).cloned())
    }

    async fn signed_download_url(
        &self,
        storage_path: &str,
        _ttl_secs: u64,
    ) -> Result<String, StoreError> {
        Ok(format!("mem://{storage_path}"))
    }

    async fn download(&self, url: &str) -> Result<Bytes, StoreError> {
        let path = url.strip_prefix("mem://").ok_or("unsupported url")?;
        self.state
            .lock()
            .unwrap()
            .objects
            .get(path)
            .cloned()
            .ok_or_else(|| format!("object not found: {path}").into())
    }
}

pub enum Reply {
    Ok(TranscriptionResponse),
    Err(String),
    Panic(&'static str),
}

#[derive(Debug, Clone)]
pub struct TranscribeCall {
    pub path: PathBuf,
    pub audio: Vec<u8>,
    pub options: TranscribeOptions,
}

#[derive(Default)]
pub struct FakeTranscriber {
    pub replies: Mutex<VecDeque<Reply>>,
    pub calls: Mutex<Vec<TranscribeCall>>,
}

impl FakeTranscriber {
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::default(),
        })
    }

    pub fn calls(&self) -> Vec<TranscribeCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transcriber for FakeTranscriber {
    async fn transcribe_audio(
        &self,
        path: &Path,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResponse, TranscribeError> {
        self.calls.lock().unwrap().push(TranscribeCall {
            path: path.to_path_buf(),
            audio: std::fs::read(path)?,
            options: options.clone(),
        });

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Ok(response)) => Ok(response),
            Some(Reply::Err(message)) => Err(message.into()),
            Some(Reply::Panic(message)) => panic!("{message}"),
            None => Err("no scripted reply".into()),
        }
    }
}

pub fn response(language: &str, words: Vec<Word>) -> TranscriptionResponse {
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<String>();
    TranscriptionResponse {
        language_code: language.to_string(),
        language_probability: 0.98,
        text,
        words,
    }
}

pub fn transcription_job(id: &str, created_at: DateTime<Utc>, payload: serde_json::Value) -> Job {
    Job {
        id: id.to_string(),
        job_type: "transcription".to_string(),
        status: JobStatus::Pending,
        payload,
        attempts: 0,
        max_attempts: 3,
        created_at,
        started_at: None,
        completed_at: None,
        result: None,
        error_message: None,
    }
}

pub fn worker<T: Transcriber>(store: Arc<MemoryStore>, transcriber: Arc<T>) -> Worker<MemoryStore, T> {
    let handler = TranscriptionHandler::new(store.clone(), transcriber);
    Worker::new(store, Dispatcher::new(handler), WorkerConfig::default())
}
