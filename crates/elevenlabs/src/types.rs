use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordType {
    Word,
    Spacing,
    AudioEvent,
    #[serde(other)]
    Unknown,
}

/// One timed token as returned by the speech-to-text endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: WordType,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub speaker_id: Option<String>,
}

impl Word {
    pub fn word(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            kind: WordType::Word,
            start: Some(start),
            end: Some(end),
            speaker_id: None,
        }
    }

    pub fn with_speaker(mut self, speaker_id: impl Into<String>) -> Self {
        self.speaker_id = Some(speaker_id.into());
        self
    }

    pub fn with_kind(mut self, kind: WordType) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_timed(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub language_probability: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimestampsGranularity {
    None,
    #[default]
    Word,
    Character,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscribeOptions {
    pub language: Option<String>,
    pub diarize: bool,
    /// Only sent when `diarize` is set.
    pub num_speakers: Option<u32>,
    pub timestamps_granularity: Option<TimestampsGranularity>,
    pub tag_audio_events: bool,
}
