mod transcription;

pub use transcription::{DEFAULT_DOWNLOAD_TTL_SECS, TranscriptionHandler, TranscriptionOutcome};
