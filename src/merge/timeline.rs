//! Global word timeline.
//!
//! The merger owns the session-wide word sequence. Each chunk's words are
//! shifted to global time and admitted only when they extend past the last
//! emitted millisecond; boundary-straddling words may replace the timeline's
//! tail word when decisively more confident. Everything returned from
//! `merge_chunk` is new content the formatter may emit.

use crate::decode::ctc::WordTiming;
use log::debug;

/// A word on the global timeline (times in session milliseconds).
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineWord {
    pub text: String,
    pub start_ms: f64,
    pub end_ms: f64,
    pub confidence: f32,
}

/// Configuration slice for the merger.
#[derive(Debug, Clone, Copy)]
pub struct TimelineConfig {
    pub min_word_confidence: f32,
    /// Margin parameter: a straddling word replaces the tail word when its
    /// confidence beats the tail's by more than `overlap_confidence - 0.5`.
    pub overlap_confidence: f32,
    pub confidence_replacement: bool,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_word_confidence: crate::defaults::TIMELINE_MIN_WORD_CONFIDENCE,
            overlap_confidence: crate::defaults::TIMELINE_OVERLAP_CONFIDENCE,
            confidence_replacement: true,
        }
    }
}

/// Timeline-based chunk merger using word-level timestamps.
pub struct TimelineMerger {
    config: TimelineConfig,
    timeline: Vec<TimelineWord>,
    last_emitted_end_ms: f64,
}

impl TimelineMerger {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            config,
            timeline: Vec::new(),
            last_emitted_end_ms: 0.0,
        }
    }

    /// Merge one chunk's (post-stitch) words at the given global offset.
    ///
    /// Returns the words that became part of the timeline in this call, in
    /// order; replacements carry the replaced position's new content.
    pub fn merge_chunk(&mut self, words: &[WordTiming], chunk_offset_ms: f64) -> Vec<TimelineWord> {
        let mut emitted = Vec::new();

        for word in words {
            let start_ms = chunk_offset_ms + word.start_ms;
            let end_ms = chunk_offset_ms + word.end_ms;

            if word.confidence < self.config.min_word_confidence {
                debug!(
                    "timeline skip word={:?} conf={:.2} reason=low-confidence",
                    word.text, word.confidence
                );
                continue;
            }

            // Entirely before the frontier: already covered.
            if end_ms <= self.last_emitted_end_ms {
                continue;
            }

            // Straddling the frontier: replacement or drop.
            if start_ms < self.last_emitted_end_ms {
                if self.config.confidence_replacement
                    && let Some(replaced) = self.try_replace_tail(word, start_ms, end_ms)
                {
                    emitted.push(replaced);
                }
                continue;
            }

            // Strictly new content.
            let new_word = TimelineWord {
                text: word.text.clone(),
                start_ms,
                end_ms,
                confidence: word.confidence,
            };
            self.timeline.push(new_word.clone());
            self.last_emitted_end_ms = end_ms;
            emitted.push(new_word);
        }

        emitted
    }

    /// Replace the timeline's tail word when the straddling word is
    /// decisively more confident. The margin is
    /// `overlap_confidence - 0.5`, so the default 0.6 demands +0.1.
    fn try_replace_tail(
        &mut self,
        word: &WordTiming,
        start_ms: f64,
        end_ms: f64,
    ) -> Option<TimelineWord> {
        let tail = self.timeline.last_mut()?;
        let margin = self.config.overlap_confidence - 0.5;
        if word.confidence <= tail.confidence + margin {
            return None;
        }

        debug!(
            "timeline replace old={:?} conf={:.2} new={:?} conf={:.2}",
            tail.text, tail.confidence, word.text, word.confidence
        );
        *tail = TimelineWord {
            text: word.text.clone(),
            start_ms,
            end_ms,
            confidence: word.confidence,
        };
        self.last_emitted_end_ms = self.last_emitted_end_ms.max(end_ms);
        Some(tail.clone())
    }

    /// Frontier of emitted content in global milliseconds.
    pub fn last_emitted_end_ms(&self) -> f64 {
        self.last_emitted_end_ms
    }

    /// Full session text.
    pub fn timeline_text(&self) -> String {
        self.timeline
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.timeline.len()
    }
}
