//! Inline metadata tags emitted by the encoder.
//!
//! The token stream interleaves `<|tag|>` tokens with content pieces:
//! language identification, speech emotion, audio events, and the inverse
//! text normalization marker. Tags are closed enumerations with an
//! `Unknown` arm for forward compatibility.

use std::fmt;

/// Languages the encoder can identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Chinese,
    Japanese,
    Korean,
    Cantonese,
}

impl Language {
    /// Parse a short code as used in tags and the LANGUAGE variable.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "en" => Some(Language::English),
            "zh" => Some(Language::Chinese),
            "ja" => Some(Language::Japanese),
            "ko" => Some(Language::Korean),
            "yue" => Some(Language::Cantonese),
            _ => None,
        }
    }

    /// Short code form.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
            Language::Japanese => "ja",
            Language::Korean => "ko",
            Language::Cantonese => "yue",
        }
    }

    /// Canonical display name.
    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Chinese => "Chinese",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::Cantonese => "Cantonese",
        }
    }

    /// Row index of this language's task-query embedding. Row 0 is the
    /// auto-detect query.
    pub fn embedding_row(&self) -> usize {
        match self {
            Language::Chinese => 3,
            Language::English => 4,
            Language::Cantonese => 7,
            Language::Japanese => 11,
            Language::Korean => 12,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Speech emotion categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Neutral,
    Fearful,
    Disgusted,
    Surprised,
    Unknown(String),
}

impl Emotion {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "HAPPY" => Emotion::Happy,
            "SAD" => Emotion::Sad,
            "ANGRY" => Emotion::Angry,
            "NEUTRAL" => Emotion::Neutral,
            "FEARFUL" => Emotion::Fearful,
            "DISGUSTED" => Emotion::Disgusted,
            "SURPRISED" => Emotion::Surprised,
            other => Emotion::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Emotion::Happy => "HAPPY",
            Emotion::Sad => "SAD",
            Emotion::Angry => "ANGRY",
            Emotion::Neutral => "NEUTRAL",
            Emotion::Fearful => "FEARFUL",
            Emotion::Disgusted => "DISGUSTED",
            Emotion::Surprised => "SURPRISED",
            Emotion::Unknown(s) => s,
        }
    }

    /// Emoji used when emotion display is enabled. Neutral renders nothing.
    pub fn emoji(&self) -> Option<&'static str> {
        match self {
            Emotion::Happy => Some("😊"),
            Emotion::Sad => Some("😢"),
            Emotion::Angry => Some("😠"),
            Emotion::Fearful => Some("😨"),
            Emotion::Disgusted => Some("🤢"),
            Emotion::Surprised => Some("😲"),
            Emotion::Neutral | Emotion::Unknown(_) => None,
        }
    }
}

/// Audio event categories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AudioEvent {
    Bgm,
    Applause,
    Laughter,
    Crying,
    Sneeze,
    Cough,
    Breath,
    Speech,
    Unknown(String),
}

impl AudioEvent {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "BGM" => AudioEvent::Bgm,
            "Applause" => AudioEvent::Applause,
            "Laughter" => AudioEvent::Laughter,
            "Crying" => AudioEvent::Crying,
            "Sneeze" => AudioEvent::Sneeze,
            "Cough" => AudioEvent::Cough,
            "Breath" => AudioEvent::Breath,
            "Speech" => AudioEvent::Speech,
            other => AudioEvent::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AudioEvent::Bgm => "BGM",
            AudioEvent::Applause => "Applause",
            AudioEvent::Laughter => "Laughter",
            AudioEvent::Crying => "Crying",
            AudioEvent::Sneeze => "Sneeze",
            AudioEvent::Cough => "Cough",
            AudioEvent::Breath => "Breath",
            AudioEvent::Speech => "Speech",
            AudioEvent::Unknown(s) => s,
        }
    }

    /// Emoji used when event display is enabled.
    pub fn emoji(&self) -> Option<&'static str> {
        match self {
            AudioEvent::Bgm => Some("🎵"),
            AudioEvent::Applause => Some("👏"),
            AudioEvent::Laughter => Some("😄"),
            AudioEvent::Crying => Some("😭"),
            AudioEvent::Sneeze => Some("🤧"),
            AudioEvent::Cough => Some("😷"),
            AudioEvent::Breath | AudioEvent::Speech | AudioEvent::Unknown(_) => None,
        }
    }
}

/// One parsed `<|tag|>` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaTag {
    Language(Language),
    Emotion(Emotion),
    Event(AudioEvent),
    /// `withitn` / `woitn` text normalization marker.
    Itn(bool),
    Unknown(String),
}

/// Parse a token piece of the form `<|tag|>`. Returns `None` when the piece
/// is not a tag token at all (ordinary content).
pub fn parse_tag(piece: &str) -> Option<MetaTag> {
    let inner = piece.strip_prefix("<|")?.strip_suffix("|>")?;

    if let Some(lang) = Language::from_code(inner) {
        return Some(MetaTag::Language(lang));
    }
    match inner {
        "withitn" => return Some(MetaTag::Itn(true)),
        "woitn" => return Some(MetaTag::Itn(false)),
        _ => {}
    }
    match Emotion::from_tag(inner) {
        Emotion::Unknown(_) => {}
        emotion => return Some(MetaTag::Emotion(emotion)),
    }
    match AudioEvent::from_tag(inner) {
        AudioEvent::Unknown(_) => {}
        event => return Some(MetaTag::Event(event)),
    }
    Some(MetaTag::Unknown(inner.to_string()))
}

/// Accumulated metadata for one chunk.
///
/// At most one language and one emotion are kept (last seen wins); events
/// accumulate into a set-like list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMetadata {
    pub language: Option<Language>,
    pub emotion: Option<Emotion>,
    pub audio_events: Vec<AudioEvent>,
    pub has_itn: bool,
}

impl ChunkMetadata {
    /// Fold one tag into the chunk metadata.
    pub fn absorb(&mut self, tag: MetaTag) {
        match tag {
            MetaTag::Language(lang) => self.language = Some(lang),
            MetaTag::Emotion(emotion) => self.emotion = Some(emotion),
            MetaTag::Event(event) => {
                if !self.audio_events.contains(&event) {
                    self.audio_events.push(event);
                }
            }
            MetaTag::Itn(itn) => self.has_itn = itn,
            // Unknown tags survive in raw_text only.
            MetaTag::Unknown(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes_round_trip() {
        for lang in [
            Language::English,
            Language::Chinese,
            Language::Japanese,
            Language::Korean,
            Language::Cantonese,
        ] {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
        assert_eq!(Language::from_code("fr"), None);
    }

    #[test]
    fn test_language_embedding_rows() {
        assert_eq!(Language::Chinese.embedding_row(), 3);
        assert_eq!(Language::English.embedding_row(), 4);
        assert_eq!(Language::Cantonese.embedding_row(), 7);
        assert_eq!(Language::Japanese.embedding_row(), 11);
        assert_eq!(Language::Korean.embedding_row(), 12);
    }

    #[test]
    fn test_parse_language_tag() {
        assert_eq!(
            parse_tag("<|en|>"),
            Some(MetaTag::Language(Language::English))
        );
        assert_eq!(
            parse_tag("<|yue|>"),
            Some(MetaTag::Language(Language::Cantonese))
        );
    }

    #[test]
    fn test_parse_emotion_and_event_tags() {
        assert_eq!(
            parse_tag("<|HAPPY|>"),
            Some(MetaTag::Emotion(Emotion::Happy))
        );
        assert_eq!(parse_tag("<|BGM|>"), Some(MetaTag::Event(AudioEvent::Bgm)));
        assert_eq!(
            parse_tag("<|Laughter|>"),
            Some(MetaTag::Event(AudioEvent::Laughter))
        );
    }

    #[test]
    fn test_parse_itn_markers() {
        assert_eq!(parse_tag("<|withitn|>"), Some(MetaTag::Itn(true)));
        assert_eq!(parse_tag("<|woitn|>"), Some(MetaTag::Itn(false)));
    }

    #[test]
    fn test_parse_unknown_tag_preserved() {
        assert_eq!(
            parse_tag("<|SOMETHING_NEW|>"),
            Some(MetaTag::Unknown("SOMETHING_NEW".to_string()))
        );
    }

    #[test]
    fn test_parse_non_tag_piece() {
        assert_eq!(parse_tag("▁hello"), None);
        assert_eq!(parse_tag("<|unterminated"), None);
    }

    #[test]
    fn test_metadata_last_language_wins() {
        let mut meta = ChunkMetadata::default();
        meta.absorb(MetaTag::Language(Language::English));
        meta.absorb(MetaTag::Language(Language::Chinese));
        assert_eq!(meta.language, Some(Language::Chinese));
    }

    #[test]
    fn test_metadata_events_accumulate_unique() {
        let mut meta = ChunkMetadata::default();
        meta.absorb(MetaTag::Event(AudioEvent::Bgm));
        meta.absorb(MetaTag::Event(AudioEvent::Applause));
        meta.absorb(MetaTag::Event(AudioEvent::Bgm));
        assert_eq!(
            meta.audio_events,
            vec![AudioEvent::Bgm, AudioEvent::Applause]
        );
    }

    #[test]
    fn test_metadata_unknown_tag_ignored() {
        let mut meta = ChunkMetadata::default();
        meta.absorb(MetaTag::Unknown("MYSTERY".to_string()));
        assert_eq!(meta, ChunkMetadata::default());
    }

    #[test]
    fn test_neutral_emotion_has_no_emoji() {
        assert_eq!(Emotion::Neutral.emoji(), None);
        assert!(Emotion::Happy.emoji().is_some());
    }
}
