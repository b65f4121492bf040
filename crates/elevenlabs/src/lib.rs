mod client;
mod error;
mod types;

pub use client::{ElevenLabsClient, ElevenLabsClientBuilder, RetryConfig};
pub use error::Error;
pub use types::*;
