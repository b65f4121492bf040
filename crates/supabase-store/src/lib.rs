mod client;
mod error;

pub use client::{DEFAULT_AUDIO_BUCKET, SupabaseClient};
pub use error::Error;
