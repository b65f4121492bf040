use std::future::Future;
use std::path::Path;

use vox_elevenlabs::{ElevenLabsClient, TranscribeOptions, TranscriptionResponse};

pub type TranscribeError = Box<dyn std::error::Error + Send + Sync>;

pub trait Transcriber: Send + Sync + 'static {
    fn transcribe_audio(
        &self,
        path: &Path,
        options: &TranscribeOptions,
    ) -> impl Future<Output = Result<TranscriptionResponse, TranscribeError>> + Send;
}

impl Transcriber for ElevenLabsClient {
    async fn transcribe_audio(
        &self,
        path: &Path,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResponse, TranscribeError> {
        self.transcribe_file(path, options).await.map_err(Into::into)
    }
}
