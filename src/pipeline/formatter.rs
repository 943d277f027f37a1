//! Output formatting and metadata filtering.

use crate::config::Config;
use crate::decode::ctc::DecodeResult;
use crate::merge::timeline::TimelineWord;
use crate::pipeline::types::{ConfidenceBucket, Emission, TranscriptionRecord};
use chrono::{SecondsFormat, Utc};

/// Source tag stamped on every broadcast record.
const RECORD_SOURCE: &str = "livesense";

/// Builds display strings and wire records from merged output.
pub struct OutputFormatter {
    filter_bgm: bool,
    filter_events: Vec<String>,
    show_emotions: bool,
    show_events: bool,
    show_language: bool,
    min_chars: usize,
}

impl OutputFormatter {
    pub fn new(config: &Config) -> Self {
        Self {
            filter_bgm: config.filter_bgm,
            filter_events: config.filter_events.clone(),
            show_emotions: config.show_emotions,
            show_events: config.show_events,
            show_language: config.show_language,
            min_chars: config.min_chars,
        }
    }

    /// Returns the reason a chunk is filtered by its detected events, if
    /// any.
    pub fn event_filter_reason(&self, result: &DecodeResult) -> Option<String> {
        for event in &result.metadata.audio_events {
            let label = event.label();
            if self.filter_bgm && label == "BGM" {
                return Some("background music detected".to_string());
            }
            if self.filter_events.iter().any(|f| f == label) {
                return Some(format!("filtered event: {}", label));
            }
        }
        None
    }

    /// Whether the text clears the alphanumeric floor.
    pub fn has_enough_content(&self, text: &str) -> bool {
        text.chars().filter(|c| c.is_alphanumeric()).count() >= self.min_chars
    }

    /// Compose the console line: emojis, text, language suffix.
    pub fn display_text(&self, text: &str, result: &DecodeResult) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.show_emotions
            && let Some(emotion) = &result.metadata.emotion
            && let Some(emoji) = emotion.emoji()
        {
            parts.push(emoji.to_string());
        }

        if self.show_events {
            for event in &result.metadata.audio_events {
                if let Some(emoji) = event.emoji() {
                    parts.push(emoji.to_string());
                }
            }
        }

        parts.push(text.to_string());

        if self.show_language
            && let Some(language) = result.metadata.language
        {
            parts.push(format!("[{}]", language.name()));
        }

        parts.join(" ")
    }

    /// Build the full emission for newly merged words.
    pub fn emission(
        &self,
        text: &str,
        result: &DecodeResult,
        new_words: Vec<TimelineWord>,
        confidence: f32,
    ) -> Emission {
        let record = TranscriptionRecord {
            kind: "transcription",
            text: text.to_string(),
            language: result.metadata.language.map(|l| l.name().to_string()),
            emotion: result
                .metadata
                .emotion
                .as_ref()
                .map(|e| e.label().to_string()),
            audio_events: result
                .metadata
                .audio_events
                .iter()
                .map(|e| e.label().to_string())
                .collect(),
            has_itn: result.metadata.has_itn,
            raw_text: result.raw_text.clone(),
            confidence: ConfidenceBucket::from_score(confidence),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            source: RECORD_SOURCE.to_string(),
        };

        Emission {
            display_text: self.display_text(text, result),
            record,
            new_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::metadata::{AudioEvent, ChunkMetadata, Emotion, Language};

    fn result_with(meta: ChunkMetadata) -> DecodeResult {
        DecodeResult {
            words: Vec::new(),
            text: "hello world".to_string(),
            raw_text: "<|en|> hello world".to_string(),
            avg_confidence: 0.9,
            metadata: meta,
        }
    }

    fn formatter(config: Config) -> OutputFormatter {
        OutputFormatter::new(&config)
    }

    #[test]
    fn test_bgm_filter() {
        let config = Config {
            filter_bgm: true,
            ..Default::default()
        };
        let f = formatter(config);

        let mut meta = ChunkMetadata::default();
        meta.audio_events.push(AudioEvent::Bgm);
        assert!(f.event_filter_reason(&result_with(meta)).is_some());

        assert!(f.event_filter_reason(&result_with(ChunkMetadata::default())).is_none());
    }

    #[test]
    fn test_event_list_filter() {
        let config = Config {
            filter_events: vec!["Applause".to_string()],
            ..Default::default()
        };
        let f = formatter(config);

        let mut meta = ChunkMetadata::default();
        meta.audio_events.push(AudioEvent::Applause);
        let reason = f.event_filter_reason(&result_with(meta)).unwrap();
        assert!(reason.contains("Applause"));
    }

    #[test]
    fn test_bgm_passes_when_filter_disabled() {
        let f = formatter(Config::default());
        let mut meta = ChunkMetadata::default();
        meta.audio_events.push(AudioEvent::Bgm);
        assert!(f.event_filter_reason(&result_with(meta)).is_none());
    }

    #[test]
    fn test_min_chars_counts_alphanumerics_only() {
        let f = formatter(Config::default());
        assert!(f.has_enough_content("abc"));
        assert!(f.has_enough_content("a1!b"));
        assert!(!f.has_enough_content("ab"));
        assert!(!f.has_enough_content("?! ,"));
    }

    #[test]
    fn test_display_text_language_suffix() {
        let f = formatter(Config::default());
        let mut meta = ChunkMetadata::default();
        meta.language = Some(Language::English);
        let text = f.display_text("hello world", &result_with(meta));
        assert_eq!(text, "hello world [English]");
    }

    #[test]
    fn test_display_text_event_emoji() {
        let f = formatter(Config::default());
        let mut meta = ChunkMetadata::default();
        meta.audio_events.push(AudioEvent::Laughter);
        let text = f.display_text("so funny", &result_with(meta));
        assert!(text.starts_with("😄 "));
    }

    #[test]
    fn test_display_text_emotion_hidden_by_default() {
        let f = formatter(Config::default());
        let mut meta = ChunkMetadata::default();
        meta.emotion = Some(Emotion::Happy);
        let text = f.display_text("great", &result_with(meta));
        assert!(!text.contains("😊"));

        let f = formatter(Config {
            show_emotions: true,
            ..Default::default()
        });
        let mut meta = ChunkMetadata::default();
        meta.emotion = Some(Emotion::Happy);
        let text = f.display_text("great", &result_with(meta));
        assert!(text.contains("😊"));
    }

    #[test]
    fn test_emission_record_fields() {
        let f = formatter(Config::default());
        let mut meta = ChunkMetadata::default();
        meta.language = Some(Language::English);
        meta.emotion = Some(Emotion::Neutral);
        meta.audio_events.push(AudioEvent::Speech);
        meta.has_itn = true;

        let emission = f.emission("hello world", &result_with(meta), Vec::new(), 0.8);
        let record = &emission.record;
        assert_eq!(record.kind, "transcription");
        assert_eq!(record.text, "hello world");
        assert_eq!(record.language.as_deref(), Some("English"));
        assert_eq!(record.emotion.as_deref(), Some("NEUTRAL"));
        assert_eq!(record.audio_events, vec!["Speech"]);
        assert!(record.has_itn);
        assert_eq!(record.confidence, ConfidenceBucket::High);
        assert_eq!(record.source, "livesense");
        // RFC 3339 with millisecond precision ends in Z.
        assert!(record.timestamp.ends_with('Z'));
        assert!(record.timestamp.contains('.'));
    }
}
