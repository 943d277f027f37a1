//! Confidence-gated chunk-boundary stitching.
//!
//! Adjacent windows overlap, so the head of each chunk often re-decodes the
//! tail of the previous one, sometimes garbled. The stitcher compares the
//! previous emitted tail with the current head by edit-distance similarity
//! and, when one side is low-confidence, trims the duplicated head words
//! before the timeline merger sees them. It only ever trims the current
//! chunk's head; interior words are untouched.

use crate::decode::ctc::WordTiming;
use log::debug;
use strsim::normalized_levenshtein;

/// Similarity at or above which a boundary overlap is declared.
const OVERLAP_SIMILARITY: f64 = 0.7;

/// Tail of the previously processed chunk.
#[derive(Debug, Clone)]
pub struct ChunkTail {
    pub text: String,
    pub confidence: f32,
    pub word_count: usize,
}

/// Configuration slice for the stitcher.
#[derive(Debug, Clone, Copy)]
pub struct StitcherConfig {
    pub enabled: bool,
    pub confidence_threshold: f32,
    pub overlap_word_count: usize,
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: crate::defaults::CONFIDENCE_THRESHOLD,
            overlap_word_count: crate::defaults::OVERLAP_WORD_COUNT,
        }
    }
}

/// Edit-distance similarity in [0, 1]; empty operands score 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b)
}

/// Boundary stitcher holding the previous chunk's tail.
pub struct ConfidenceStitcher {
    config: StitcherConfig,
    prev_tail: Option<ChunkTail>,
}

impl ConfidenceStitcher {
    pub fn new(config: StitcherConfig) -> Self {
        Self {
            config,
            prev_tail: None,
        }
    }

    /// Process one chunk's words, returning them with the duplicated head
    /// removed when the gate fires.
    pub fn process(&mut self, words: Vec<WordTiming>, avg_confidence: f32) -> Vec<WordTiming> {
        if !self.config.enabled {
            return words;
        }

        let words = match &self.prev_tail {
            Some(tail) => self.trim_overlap(words, avg_confidence, tail),
            None => words,
        };

        self.update_tail(&words);
        words
    }

    fn trim_overlap(
        &self,
        words: Vec<WordTiming>,
        avg_confidence: f32,
        tail: &ChunkTail,
    ) -> Vec<WordTiming> {
        let head_count = self.config.overlap_word_count.min(words.len());
        if head_count == 0 {
            return words;
        }
        let head_text = join_words(&words[..head_count]);

        // Wildly different lengths cannot be the same phrase.
        let (shorter, longer) = if head_text.len() < tail.text.len() {
            (head_text.len(), tail.text.len())
        } else {
            (tail.text.len(), head_text.len())
        };
        if longer == 0 || (shorter as f64 / longer as f64) < 0.5 {
            return words;
        }

        let score = similarity(&tail.text, &head_text);
        if score < OVERLAP_SIMILARITY {
            return words;
        }

        if tail.confidence < self.config.confidence_threshold {
            debug!(
                "stitch trim head={:?} score={:.2} reason=weak-tail tail_conf={:.2}",
                head_text, score, tail.confidence
            );
            words[head_count..].to_vec()
        } else if avg_confidence < self.config.confidence_threshold {
            debug!(
                "stitch trim head={:?} score={:.2} reason=weak-chunk chunk_conf={:.2}",
                head_text, score, avg_confidence
            );
            words[head_count..].to_vec()
        } else {
            // Both sides confident: leave it to timeline de-duplication.
            words
        }
    }

    fn update_tail(&mut self, words: &[WordTiming]) {
        if words.is_empty() {
            self.prev_tail = None;
            return;
        }
        let count = self.config.overlap_word_count.min(words.len());
        let tail_words = &words[words.len() - count..];
        let confidence =
            tail_words.iter().map(|w| w.confidence).sum::<f32>() / tail_words.len() as f32;
        self.prev_tail = Some(ChunkTail {
            text: join_words(tail_words),
            confidence,
            word_count: count,
        });
    }

    pub fn tail(&self) -> Option<&ChunkTail> {
        self.prev_tail.as_ref()
    }
}

fn join_words(words: &[WordTiming]) -> String {
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
