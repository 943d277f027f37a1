//! Data types flowing through the pipeline.

use crate::merge::timeline::TimelineWord;
use serde::Serialize;

/// A frame of raw device-rate PCM samples.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed integers) at the device rate.
    pub samples: Vec<i16>,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sequence: u64) -> Self {
        Self { samples, sequence }
    }
}

/// One model-rate window ready for inference.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Normalized f32 samples at 16kHz, one full window.
    pub samples: Vec<f32>,
    /// Monotonically increasing window index, starting at 0.
    pub chunk_index: u64,
    /// Global timeline offset: `chunk_index * hop_ms`.
    pub start_time_ms: f64,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, chunk_index: u64, hop_ms: f64) -> Self {
        Self {
            samples,
            chunk_index,
            start_time_ms: chunk_index as f64 * hop_ms,
        }
    }
}

/// Why a chunk produced no output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Consumed by noise-floor calibration.
    Calibrating,
    /// VAD classified the chunk as non-speech.
    NoSpeech,
    /// Fingerprint matched a recent chunk.
    DuplicateChunk,
    /// Decode produced no words.
    SilentDecode,
    /// Removed by the BGM/event filter.
    Filtered,
    /// Fewer alphanumerics than the configured floor.
    BelowMinChars,
    /// Timeline merge yielded nothing new.
    NoNewWords,
    /// Text-similarity suppressor fired.
    DuplicateText,
}

/// Explicit per-chunk result; the pipeline never uses errors for chunk
/// drops.
#[derive(Debug)]
pub enum ChunkOutcome {
    Emitted(Box<Emission>),
    Dropped(DropReason),
    /// Transient failure; counted toward the error budget.
    Error(String),
}

/// Confidence bucket carried on broadcast records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceBucket {
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "LOW")]
    Low,
}

impl ConfidenceBucket {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.75 {
            ConfidenceBucket::High
        } else if score >= 0.5 {
            ConfidenceBucket::Medium
        } else {
            ConfidenceBucket::Low
        }
    }
}

/// Wire record broadcast for each emission.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
    pub language: Option<String>,
    pub emotion: Option<String>,
    pub audio_events: Vec<String>,
    pub has_itn: bool,
    pub raw_text: String,
    pub confidence: ConfidenceBucket,
    /// RFC 3339 with millisecond precision.
    pub timestamp: String,
    pub source: String,
}

/// A formatted emission: console text plus the broadcast record.
#[derive(Debug, Clone)]
pub struct Emission {
    pub display_text: String,
    pub record: TranscriptionRecord,
    /// Words newly added to the timeline by this emission.
    pub new_words: Vec<TimelineWord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_start_time_from_index() {
        let chunk = AudioChunk::new(vec![0.0; 10], 4, 1500.0);
        assert_eq!(chunk.start_time_ms, 6000.0);
        assert_eq!(chunk.chunk_index, 4);
    }

    #[test]
    fn test_confidence_buckets() {
        assert_eq!(ConfidenceBucket::from_score(0.9), ConfidenceBucket::High);
        assert_eq!(ConfidenceBucket::from_score(0.75), ConfidenceBucket::High);
        assert_eq!(ConfidenceBucket::from_score(0.6), ConfidenceBucket::Medium);
        assert_eq!(ConfidenceBucket::from_score(0.5), ConfidenceBucket::Medium);
        assert_eq!(ConfidenceBucket::from_score(0.2), ConfidenceBucket::Low);
    }

    #[test]
    fn test_record_serializes_with_wire_names() {
        let record = TranscriptionRecord {
            kind: "transcription",
            text: "hello".to_string(),
            language: Some("English".to_string()),
            emotion: None,
            audio_events: vec![],
            has_itn: true,
            raw_text: "<|en|> hello".to_string(),
            confidence: ConfidenceBucket::High,
            timestamp: "2025-01-01T00:00:00.000Z".to_string(),
            source: "livesense".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "transcription");
        assert_eq!(json["confidence"], "HIGH");
        assert_eq!(json["language"], "English");
        assert!(json["emotion"].is_null());
    }

    #[test]
    fn test_frame_construction() {
        let frame = AudioFrame::new(vec![1, 2, 3], 7);
        assert_eq!(frame.samples, vec![1, 2, 3]);
        assert_eq!(frame.sequence, 7);
    }
}
