use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// Treats `FOO=` the same as an unset variable.
pub fn filter_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn parse_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim().parse::<T>().map_err(serde::de::Error::custom)
}

pub fn string_to_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    parse_number(deserializer)
}

pub fn string_to_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    parse_number(deserializer)
}

pub fn string_to_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid boolean value: {other}"
        ))),
    }
}

fn default_audio_bucket() -> String {
    "audio-files".to_string()
}

#[derive(Clone, Deserialize)]
pub struct SupabaseEnv {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    #[serde(default = "default_audio_bucket")]
    pub supabase_audio_bucket: String,
}

fn default_elevenlabs_api_base() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_elevenlabs_model_id() -> String {
    "scribe_v1".to_string()
}

fn default_elevenlabs_timeout_secs() -> u64 {
    300
}

fn default_elevenlabs_max_retries() -> usize {
    3
}

#[derive(Clone, Deserialize)]
pub struct ElevenLabsEnv {
    pub elevenlabs_api_key: String,
    #[serde(default = "default_elevenlabs_api_base")]
    pub elevenlabs_api_base: String,
    #[serde(default = "default_elevenlabs_model_id")]
    pub elevenlabs_model_id: String,
    #[serde(
        default = "default_elevenlabs_timeout_secs",
        deserialize_with = "string_to_u64"
    )]
    pub elevenlabs_timeout_secs: u64,
    #[serde(
        default = "default_elevenlabs_max_retries",
        deserialize_with = "string_to_usize"
    )]
    pub elevenlabs_max_retries: usize,
}

fn default_worker_max_jobs() -> usize {
    5
}

fn default_worker_poll_interval_secs() -> u64 {
    10
}

fn default_worker_stuck_minutes() -> u64 {
    30
}

#[derive(Clone, Deserialize)]
pub struct WorkerEnv {
    pub worker_api_key: String,
    #[serde(default = "default_worker_max_jobs", deserialize_with = "string_to_usize")]
    pub worker_max_jobs: usize,
    #[serde(
        default = "default_worker_poll_interval_secs",
        deserialize_with = "string_to_u64"
    )]
    pub worker_poll_interval_secs: u64,
    #[serde(
        default = "default_worker_stuck_minutes",
        deserialize_with = "string_to_u64"
    )]
    pub worker_stuck_minutes: u64,
    #[serde(default, deserialize_with = "string_to_bool")]
    pub worker_background: bool,
}
