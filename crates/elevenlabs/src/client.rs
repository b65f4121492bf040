use std::path::Path;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::error::Error;
use crate::types::{TranscribeOptions, TranscriptionResponse};

const DEFAULT_API_BASE: &str = "https://api.elevenlabs.io";
const DEFAULT_MODEL_ID: &str = "scribe_v1";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

const DEFAULT_NUM_RETRIES: usize = 3;
const DEFAULT_MIN_DELAY_MS: u64 = 1000;
const DEFAULT_MAX_DELAY_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub num_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            num_retries: DEFAULT_NUM_RETRIES,
            min_delay: Duration::from_millis(DEFAULT_MIN_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
        }
    }
}

#[derive(Default)]
pub struct ElevenLabsClientBuilder {
    api_base: Option<String>,
    api_key: Option<String>,
    model_id: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryConfig>,
}

impl ElevenLabsClientBuilder {
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> Result<ElevenLabsClient, Error> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("api_key is required".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            )
            .build()?;

        Ok(ElevenLabsClient {
            http,
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model_id: self
                .model_id
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model_id: String,
    retry: RetryConfig,
}

impl ElevenLabsClient {
    pub fn builder() -> ElevenLabsClientBuilder {
        ElevenLabsClientBuilder::default()
    }

    pub async fn transcribe_file(
        &self,
        path: impl AsRef<Path>,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResponse, Error> {
        let path = path.as_ref();
        let audio = Bytes::from(tokio::fs::read(path).await?);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        self.transcribe(audio, &file_name, options).await
    }

    /// Retries transient failures with exponential backoff. The retry budget
    /// belongs to this call only.
    pub async fn transcribe(
        &self,
        audio: Bytes,
        file_name: &str,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResponse, Error> {
        let backoff = ExponentialBuilder::default()
            .with_jitter()
            .with_min_delay(self.retry.min_delay)
            .with_max_delay(self.retry.max_delay)
            .with_max_times(self.retry.num_retries);

        (|| async { self.transcribe_once(audio.clone(), file_name, options).await })
            .retry(backoff)
            .when(|e: &Error| e.is_retryable())
            .notify(|err, dur| {
                tracing::warn!(
                    error = %err,
                    retry_delay_ms = dur.as_millis(),
                    "retrying_transcription"
                );
            })
            .await
    }

    async fn transcribe_once(
        &self,
        audio: Bytes,
        file_name: &str,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResponse, Error> {
        let url = format!("{}/v1/speech-to-text", self.api_base);
        let form = self.build_form(audio, file_name, options);

        tracing::debug!(
            model_id = %self.model_id,
            language = ?options.language,
            diarize = options.diarize,
            "transcription_request"
        );

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(Error::Decode)
    }

    fn build_form(&self, audio: Bytes, file_name: &str, options: &TranscribeOptions) -> Form {
        // `Bytes` is reference counted, so each attempt shares one buffer.
        let length = audio.len() as u64;
        let file = Part::stream_with_length(reqwest::Body::from(audio), length)
            .file_name(file_name.to_string());

        let mut form = Form::new()
            .text("model_id", self.model_id.clone())
            .part("file", file)
            .text("diarize", options.diarize.to_string())
            .text("tag_audio_events", options.tag_audio_events.to_string());

        if let Some(language) = options.language.as_ref().filter(|l| !l.is_empty()) {
            form = form.text("language_code", language.clone());
        }
        if options.diarize {
            if let Some(num_speakers) = options.num_speakers {
                form = form.text("num_speakers", num_speakers.to_string());
            }
        }
        if let Some(granularity) = options.timestamps_granularity {
            form = form.text("timestamps_granularity", granularity.as_ref().to_string());
        }

        form
    }
}
