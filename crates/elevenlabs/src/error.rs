use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ElevenLabs API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to read audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl Error {
    /// Network failures, 429 and 5xx are worth another attempt; everything
    /// else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(e) => {
                if let Some(status) = e.status() {
                    return is_retryable_status(status.as_u16());
                }
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            Self::Api { status, .. } => is_retryable_status(*status),
            Self::Decode(_) | Self::Io(_) | Self::Config(_) => false,
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}
