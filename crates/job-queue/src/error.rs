use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("invalid job payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error(
        "segments for transcription {transcription_id} were written ({segment_count} rows) but finalizing failed: {source}"
    )]
    PartialWrite {
        transcription_id: String,
        segment_count: usize,
        #[source]
        source: StoreError,
    },

    #[error("maximum attempts exceeded ({attempts}/{max_attempts})")]
    MaxAttemptsExceeded { attempts: u32, max_attempts: u32 },

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("failed to spool audio: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub(crate) fn store(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { context, source }
    }
}
