//! Minimal detokenizer interface over the subword vocabulary.
//!
//! The vocabulary uses sentence-piece style subwords where a U+2581 prefix
//! marks a word boundary. The pipeline only needs id → piece lookup; word
//! assembly happens in the CTC decoder.

use crate::error::{LivesenseError, Result};
use std::fs;
use std::path::Path;

/// Word-boundary marker prefix on subword pieces.
pub const BOUNDARY_MARKER: char = '\u{2581}';

/// Id → subword piece lookup.
pub trait Detokenizer: Send {
    /// The piece for a token id, or None for out-of-range ids.
    fn piece(&self, id: u32) -> Option<&str>;

    fn vocab_size(&self) -> usize;

    /// The CTC blank id.
    fn blank_id(&self) -> u32 {
        0
    }

    /// Plain-text rendering of an id sequence: concatenated pieces with
    /// boundary markers turned into spaces.
    fn decode_ids(&self, ids: &[u32]) -> String {
        let mut out = String::new();
        for &id in ids {
            if let Some(piece) = self.piece(id) {
                out.push_str(piece);
            }
        }
        out.replace(BOUNDARY_MARKER, " ").trim().to_string()
    }
}

/// Vocabulary loaded from a piece-per-line text file; the token id is the
/// line index.
pub struct VocabDetokenizer {
    pieces: Vec<String>,
}

impl VocabDetokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| LivesenseError::TokenizerLoad {
            message: format!("{}: {}", path.display(), e),
        })?;
        let pieces: Vec<String> = contents.lines().map(|l| l.to_string()).collect();
        if pieces.is_empty() {
            return Err(LivesenseError::TokenizerLoad {
                message: format!("{}: empty vocabulary", path.display()),
            });
        }
        Ok(Self { pieces })
    }

    pub fn from_pieces(pieces: Vec<String>) -> Self {
        Self { pieces }
    }
}

impl Detokenizer for VocabDetokenizer {
    fn piece(&self, id: u32) -> Option<&str> {
        self.pieces.get(id as usize).map(|s| s.as_str())
    }

    fn vocab_size(&self) -> usize {
        self.pieces.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_vocab() -> VocabDetokenizer {
        VocabDetokenizer::from_pieces(
            [
                "<blank>", "▁hello", "▁world", "ing", "▁how", "<|en|>", ",",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }

    #[test]
    fn test_piece_lookup() {
        let vocab = test_vocab();
        assert_eq!(vocab.piece(1), Some("▁hello"));
        assert_eq!(vocab.piece(5), Some("<|en|>"));
        assert_eq!(vocab.piece(99), None);
        assert_eq!(vocab.vocab_size(), 7);
        assert_eq!(vocab.blank_id(), 0);
    }

    #[test]
    fn test_decode_ids_restores_spaces() {
        let vocab = test_vocab();
        assert_eq!(vocab.decode_ids(&[1, 2]), "hello world");
        assert_eq!(vocab.decode_ids(&[1, 3]), "helloing");
        assert_eq!(vocab.decode_ids(&[1, 6, 2]), "hello, world");
    }

    #[test]
    fn test_decode_ids_skips_out_of_range() {
        let vocab = test_vocab();
        assert_eq!(vocab.decode_ids(&[1, 99, 2]), "hello world");
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<blank>").unwrap();
        writeln!(file, "▁quick").unwrap();
        writeln!(file, "▁fox").unwrap();

        let vocab = VocabDetokenizer::from_file(file.path()).unwrap();
        assert_eq!(vocab.vocab_size(), 3);
        assert_eq!(vocab.decode_ids(&[1, 2]), "quick fox");
    }

    #[test]
    fn test_from_file_missing_is_load_error() {
        let result = VocabDetokenizer::from_file(Path::new("/nonexistent/vocab.txt"));
        assert!(matches!(
            result,
            Err(LivesenseError::TokenizerLoad { .. })
        ));
    }

    #[test]
    fn test_empty_vocab_rejected() {
        let file = NamedTempFile::new().unwrap();
        let result = VocabDetokenizer::from_file(file.path());
        assert!(result.is_err());
    }
}
