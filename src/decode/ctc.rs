//! CTC decoding with per-token confidence and timing.
//!
//! The encoder emits `[1, V, T_total]` logits covering the task-query rows
//! and the acoustic frames. Decoding discards the query columns, collapses
//! repeated argmax ids, removes blanks, maps frames to chunk-local
//! milliseconds, and assembles subword pieces into timed words while
//! extracting inline metadata tags.

use crate::decode::encoder::Tensor;
use crate::decode::metadata::{self, ChunkMetadata};
use crate::decode::tokenizer::{BOUNDARY_MARKER, Detokenizer};
use crate::error::{LivesenseError, Result};

/// Average blank posterior above which a chunk is treated as silence.
const BLANK_GATE: f32 = 0.97;

/// One collapsed CTC run.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenTiming {
    pub token_id: u32,
    pub start_ms: f64,
    pub end_ms: f64,
    /// Max posterior across the frames that decoded to this token.
    pub confidence: f32,
}

/// A word with chunk-local timing.
#[derive(Debug, Clone, PartialEq)]
pub struct WordTiming {
    pub text: String,
    pub start_ms: f64,
    pub end_ms: f64,
    /// Mean of constituent piece confidences.
    pub confidence: f32,
}

/// Decoded content and metadata for one chunk.
#[derive(Debug, Clone, Default)]
pub struct DecodeResult {
    pub words: Vec<WordTiming>,
    /// Canonical text: word texts joined with single spaces.
    pub text: String,
    /// Piece concatenation including metadata tags, markers replaced.
    pub raw_text: String,
    /// Mean of word confidences; 0 when empty.
    pub avg_confidence: f32,
    pub metadata: ChunkMetadata,
}

impl DecodeResult {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Argmax CTC decoder over the subword vocabulary.
pub struct CtcDecoder {
    detokenizer: Box<dyn Detokenizer>,
}

impl CtcDecoder {
    pub fn new(detokenizer: Box<dyn Detokenizer>) -> Self {
        Self { detokenizer }
    }

    /// Decode one chunk.
    ///
    /// # Arguments
    /// * `logits` - encoder output `[1, V, T_total]`
    /// * `query_rows` - task-query columns to discard from the front
    /// * `chunk_duration_ms` - chunk window length for frame → ms mapping
    pub fn decode(
        &self,
        logits: &Tensor,
        query_rows: usize,
        chunk_duration_ms: f64,
    ) -> Result<DecodeResult> {
        let [batch, vocab, t_total] = logits.shape;
        if batch != 1 || vocab == 0 {
            return Err(LivesenseError::Decode {
                message: format!("unexpected logits shape {:?}", logits.shape),
            });
        }
        if t_total <= query_rows {
            return Err(LivesenseError::Decode {
                message: format!(
                    "output frames {} do not cover {} query rows",
                    t_total, query_rows
                ),
            });
        }

        let blank = self.detokenizer.blank_id();
        let frames = t_total - query_rows;
        let ms_per_frame = chunk_duration_ms / frames as f64;

        // Frame-wise argmax + posterior, skipping the query columns.
        let mut ids = Vec::with_capacity(frames);
        let mut confs = Vec::with_capacity(frames);
        let mut blank_prob_sum = 0.0f64;

        for frame in 0..frames {
            let t = query_rows + frame;

            let mut max_logit = f32::MIN;
            let mut argmax = 0usize;
            for v in 0..vocab {
                let value = logits.at(0, v, t);
                if value > max_logit {
                    max_logit = value;
                    argmax = v;
                }
            }

            let mut denom = 0.0f64;
            for v in 0..vocab {
                denom += f64::from((logits.at(0, v, t) - max_logit).exp());
            }
            let posterior = |v: usize| {
                (f64::from((logits.at(0, v, t) - max_logit).exp()) / denom) as f32
            };

            blank_prob_sum += f64::from(posterior(blank as usize));
            ids.push(argmax as u32);
            confs.push(posterior(argmax));
        }

        // Silence gate: overwhelmingly blank output never reaches collapse.
        let avg_blank = (blank_prob_sum / frames as f64) as f32;
        if avg_blank > BLANK_GATE {
            return Ok(DecodeResult::default());
        }

        let runs = collapse_runs(&ids, &confs, blank, ms_per_frame);
        Ok(self.assemble(&runs))
    }

    /// Turn collapsed runs into words + metadata.
    fn assemble(&self, runs: &[TokenTiming]) -> DecodeResult {
        fn finish_word(
            words: &mut Vec<WordTiming>,
            current: &mut Option<WordTiming>,
            confs: &mut Vec<f32>,
        ) {
            if let Some(mut word) = current.take() {
                if !confs.is_empty() {
                    word.confidence = confs.iter().sum::<f32>() / confs.len() as f32;
                }
                confs.clear();
                if !word.text.is_empty() {
                    words.push(word);
                }
            }
        }

        let mut meta = ChunkMetadata::default();
        let mut raw_text = String::new();
        let mut words: Vec<WordTiming> = Vec::new();
        let mut current: Option<WordTiming> = None;
        // Piece confidences for the word currently being built.
        let mut piece_confs: Vec<f32> = Vec::new();

        for run in runs {
            let Some(piece) = self.detokenizer.piece(run.token_id) else {
                continue;
            };
            raw_text.push_str(piece);

            if let Some(tag) = metadata::parse_tag(piece) {
                meta.absorb(tag);
                continue;
            }

            let (is_boundary, text) = match piece.strip_prefix(BOUNDARY_MARKER) {
                Some(rest) => (true, rest),
                None => (false, piece),
            };
            if text.is_empty() {
                continue;
            }

            let is_punctuation = !text.chars().any(|c| c.is_alphanumeric());

            if is_boundary && !is_punctuation {
                // A boundary piece with content opens a new word.
                finish_word(&mut words, &mut current, &mut piece_confs);
                current = Some(WordTiming {
                    text: text.to_string(),
                    start_ms: run.start_ms,
                    end_ms: run.end_ms,
                    confidence: run.confidence,
                });
                piece_confs.push(run.confidence);
            } else if let Some(word) = current.as_mut() {
                word.text.push_str(text);
                word.end_ms = word.end_ms.max(run.end_ms);
                piece_confs.push(run.confidence);
            } else if is_punctuation && !words.is_empty() {
                // Attach stray punctuation to the previous word.
                let last = words.last_mut().expect("words non-empty");
                last.text.push_str(text);
                last.end_ms = last.end_ms.max(run.end_ms);
            } else {
                current = Some(WordTiming {
                    text: text.to_string(),
                    start_ms: run.start_ms,
                    end_ms: run.end_ms,
                    confidence: run.confidence,
                });
                piece_confs.push(run.confidence);
            }
        }
        finish_word(&mut words, &mut current, &mut piece_confs);

        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let avg_confidence = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
        };
        let raw_text = raw_text
            .replace(BOUNDARY_MARKER, " ")
            .trim()
            .to_string();

        DecodeResult {
            words,
            text,
            raw_text,
            avg_confidence,
            metadata: meta,
        }
    }
}

/// Collapse consecutive identical ids, then drop blanks.
///
/// Each surviving run keeps its frame extent and the max posterior seen
/// across the run.
fn collapse_runs(ids: &[u32], confs: &[f32], blank: u32, ms_per_frame: f64) -> Vec<TokenTiming> {
    let mut runs: Vec<(u32, usize, usize, f32)> = Vec::new();

    for (frame, (&id, &conf)) in ids.iter().zip(confs.iter()).enumerate() {
        match runs.last_mut() {
            Some((last_id, _, end, max_conf)) if *last_id == id => {
                *end = frame;
                if conf > *max_conf {
                    *max_conf = conf;
                }
            }
            _ => runs.push((id, frame, frame, conf)),
        }
    }

    runs.into_iter()
        .filter(|&(id, ..)| id != blank)
        .map(|(token_id, start, end, confidence)| TokenTiming {
            token_id,
            start_ms: start as f64 * ms_per_frame,
            end_ms: end as f64 * ms_per_frame,
            confidence,
        })
        .collect()
}
