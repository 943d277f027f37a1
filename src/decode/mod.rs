//! Encoder invocation and output decoding.

pub mod ctc;
pub mod encoder;
pub mod features;
pub mod fingerprint;
pub mod metadata;
pub mod tokenizer;

pub use ctc::{CtcDecoder, DecodeResult, TokenTiming, WordTiming};
pub use encoder::{EncoderClient, MockEncoderClient, Tensor};
pub use features::{CmvnStats, EmbeddingTable, FeatureBuilder, FeatureInput, LogMelFrontend};
pub use fingerprint::{ChunkFingerprinter, Fingerprint, fingerprint};
pub use metadata::{AudioEvent, ChunkMetadata, Emotion, Language, MetaTag, parse_tag};
pub use tokenizer::{BOUNDARY_MARKER, Detokenizer, VocabDetokenizer};
