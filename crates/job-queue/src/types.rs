use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use vox_elevenlabs::TimestampsGranularity;

fn default_max_attempts() -> u32 {
    3
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::AsRefStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Closed set of job types the dispatcher knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    Transcription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    pub id: String,
    /// Kept as a raw string so unknown types survive deserialization and can
    /// be reported by the dispatcher.
    pub job_type: String,
    pub status: JobStatus,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Partial update of a job row. `Some(None)` writes an explicit null.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Option<String>>,
}

impl JobPatch {
    pub fn claim(attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            attempts: Some(attempts),
            started_at: Some(Some(now)),
            completed_at: Some(None),
            error_message: Some(None),
            ..Default::default()
        }
    }

    pub fn completed(result: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            completed_at: Some(Some(now)),
            result: Some(result),
            error_message: Some(None),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        let message = message.into();
        Self {
            status: Some(JobStatus::Failed),
            completed_at: Some(Some(now)),
            result: Some(serde_json::json!({ "success": false, "error": message })),
            error_message: Some(Some(message)),
            ..Default::default()
        }
    }

    pub fn requeue(attempts: u32, message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Pending),
            attempts: Some(attempts),
            started_at: Some(None),
            completed_at: Some(None),
            result: Some(serde_json::Value::Null),
            error_message: Some(Some(message.into())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<String>,
    pub transcription_id: Option<String>,
    pub started_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn pending(limit: usize) -> Self {
        Self {
            status: Some(JobStatus::Pending),
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn stuck(started_before: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            started_before: Some(started_before),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TranscriptionPayload {
    #[serde(alias = "transcriptionId")]
    pub transcription_id: String,
    #[serde(alias = "fileId")]
    pub file_id: String,
    #[serde(default, alias = "filePath")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub diarize: bool,
    #[serde(default, alias = "numSpeakers")]
    pub num_speakers: Option<u32>,
    #[serde(default, alias = "timestampsGranularity")]
    pub timestamps_granularity: Option<TimestampsGranularity>,
    #[serde(default, alias = "tagAudioEvents")]
    pub tag_audio_events: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Downloading,
    Transcribing,
    Diarizing,
    Finalizing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscriptionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TranscriptionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_stage: Option<Option<ProgressStage>>,
}

impl TranscriptionPatch {
    pub fn status(status: TranscriptionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(TranscriptionStatus::Failed),
            error_message: Some(Some(message.into())),
            progress_stage: Some(None),
            ..Default::default()
        }
    }

    pub fn requeued(message: impl Into<String>) -> Self {
        Self {
            status: Some(TranscriptionStatus::Pending),
            error_message: Some(Some(message.into())),
            progress_stage: Some(None),
            ..Default::default()
        }
    }

    pub fn progress(stage: ProgressStage) -> Self {
        Self {
            progress_stage: Some(Some(stage)),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRow {
    pub transcription_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub original_text: String,
    pub speaker_id: String,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub storage_path: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}
