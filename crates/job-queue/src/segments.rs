use vox_elevenlabs::{Word, WordType};

use crate::types::SegmentRow;

pub const DEFAULT_PAUSE_THRESHOLD_SECS: f64 = 1.0;
pub const DEFAULT_MAX_TOKENS: usize = 15;
pub const FALLBACK_SPEAKER: &str = "unknown";
/// Added to `start_time` when a segment would otherwise have zero length.
pub const MIN_SEGMENT_SECS: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentStrategy {
    /// Break on speaker change or on a silence longer than the threshold.
    SpeakerPause { pause_threshold_secs: f64 },
    /// Break every `max_tokens` tokens regardless of speaker.
    MaxTokens { max_tokens: usize },
}

impl Default for SegmentStrategy {
    fn default() -> Self {
        Self::SpeakerPause {
            pause_threshold_secs: DEFAULT_PAUSE_THRESHOLD_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentConfig {
    pub strategy: SegmentStrategy,
    pub fallback_speaker: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            strategy: SegmentStrategy::default(),
            fallback_speaker: FALLBACK_SPEAKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub speaker_id: String,
    pub sequence_number: u32,
}

impl Segment {
    pub fn into_row(self, transcription_id: &str) -> SegmentRow {
        SegmentRow {
            transcription_id: transcription_id.to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            original_text: self.text.clone(),
            text: self.text,
            speaker_id: self.speaker_id,
            sequence_number: self.sequence_number,
        }
    }
}

struct OpenSegment {
    start: f64,
    end: f64,
    texts: Vec<String>,
    speaker: Option<String>,
    is_event: bool,
}

struct Token<'a> {
    text: &'a str,
    start: f64,
    end: f64,
    speaker: Option<&'a str>,
    is_event: bool,
}

impl<'a> Token<'a> {
    fn from_word(word: &'a Word) -> Option<Self> {
        if word.kind == WordType::Spacing {
            return None;
        }

        let text = word.text.trim();
        if text.is_empty() {
            return None;
        }

        let (start, end) = match (word.start, word.end) {
            (Some(start), Some(end)) => (start, end.max(start)),
            (Some(t), None) | (None, Some(t)) => (t, t),
            (None, None) => return None,
        };

        Some(Self {
            text,
            start,
            end,
            speaker: word.speaker_id.as_deref().filter(|s| !s.is_empty()),
            is_event: word.kind == WordType::AudioEvent,
        })
    }
}

/// Groups word-level tokens into display segments.
///
/// Spacing and untimed tokens are dropped. Audio events always stand alone.
/// A token without a speaker label continues the open segment's speaker, and
/// an unlabeled open segment adopts the first label it sees.
pub fn build_segments(words: &[Word], config: &SegmentConfig) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut open: Option<OpenSegment> = None;

    for token in words.iter().filter_map(Token::from_word) {
        match open.as_mut() {
            Some(seg) if !breaks_before(seg, &token, &config.strategy) => {
                seg.texts.push(token.text.to_string());
                seg.end = seg.end.max(token.end);
                if seg.speaker.is_none() {
                    seg.speaker = token.speaker.map(str::to_string);
                }
            }
            _ => {
                if let Some(seg) = open.take() {
                    close(seg, &mut segments, config);
                }
                open = Some(OpenSegment {
                    start: token.start,
                    end: token.end,
                    texts: vec![token.text.to_string()],
                    speaker: token.speaker.map(str::to_string),
                    is_event: token.is_event,
                });
            }
        }
    }

    if let Some(seg) = open {
        close(seg, &mut segments, config);
    }

    segments
}

fn breaks_before(seg: &OpenSegment, token: &Token<'_>, strategy: &SegmentStrategy) -> bool {
    if seg.is_event || token.is_event {
        return true;
    }

    match *strategy {
        SegmentStrategy::SpeakerPause {
            pause_threshold_secs,
        } => {
            let speaker_changed = matches!(
                (seg.speaker.as_deref(), token.speaker),
                (Some(current), Some(next)) if current != next
            );
            speaker_changed || token.start - seg.end > pause_threshold_secs
        }
        SegmentStrategy::MaxTokens { max_tokens } => seg.texts.len() >= max_tokens.max(1),
    }
}

fn close(seg: OpenSegment, segments: &mut Vec<Segment>, config: &SegmentConfig) {
    let end_time = if seg.end > seg.start {
        seg.end
    } else {
        seg.start + MIN_SEGMENT_SECS
    };

    segments.push(Segment {
        start_time: seg.start,
        end_time,
        text: seg.texts.join(" "),
        speaker_id: seg
            .speaker
            .unwrap_or_else(|| config.fallback_speaker.clone()),
        sequence_number: segments.len() as u32,
    });
}

/// Number of spoken words, excluding spacing and audio events.
pub fn word_count(words: &[Word]) -> usize {
    words
        .iter()
        .filter(|w| w.kind == WordType::Word && !w.text.trim().is_empty())
        .count()
}

/// End of the last token that carries any timing.
pub fn duration_secs(words: &[Word]) -> f64 {
    words
        .iter()
        .rev()
        .find_map(|w| w.end.or(w.start))
        .unwrap_or(0.0)
}
