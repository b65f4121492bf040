mod dispatcher;
mod error;
mod handler;
mod reclaim;
mod segments;
mod store;
mod transcriber;
mod types;
mod worker;

pub use dispatcher::Dispatcher;
pub use error::JobError;
pub use handler::{DEFAULT_DOWNLOAD_TTL_SECS, TranscriptionHandler, TranscriptionOutcome};
pub use reclaim::{DEFAULT_STUCK_MINUTES, ReclaimReport, Reclaimer};
pub use segments::{
    DEFAULT_MAX_TOKENS, DEFAULT_PAUSE_THRESHOLD_SECS, FALLBACK_SPEAKER, MIN_SEGMENT_SECS, Segment,
    SegmentConfig, SegmentStrategy, build_segments, duration_secs, word_count,
};
pub use store::{JobStore, StoreError};
pub use transcriber::{TranscribeError, Transcriber};
pub use types::*;
pub use worker::{
    DEFAULT_MAX_JOBS, DEFAULT_POLL_INTERVAL, JobReport, Worker, WorkerConfig, WorkerReport,
    WorkerSummary,
};
