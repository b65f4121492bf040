#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{operation} failed: {status} - {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} not configured")]
    NotConfigured(&'static str),
}

impl Error {
    /// Status code returned by PostgREST or Storage, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
