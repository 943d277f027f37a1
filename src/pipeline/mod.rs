//! Streaming transcription pipeline.
//!
//! Multi-station pipeline where each station runs in its own thread,
//! connected by bounded crossbeam channels for backpressure.

pub mod chunker_station;
pub mod formatter;
pub mod inference;
pub mod orchestrator;
pub mod sink;
pub mod station;
pub mod types;

pub use chunker_station::ChunkerStation;
pub use formatter::OutputFormatter;
pub use inference::InferenceStation;
pub use orchestrator::{Pipeline, PipelineHandle};
pub use sink::{CollectorSink, ConsoleSink, RecordSink, SinkStation};
pub use station::{ErrorReporter, HaltingReporter, LogReporter, Station, StationError, StationRunner};
pub use types::{
    AudioChunk, AudioFrame, ChunkOutcome, ConfidenceBucket, DropReason, Emission,
    TranscriptionRecord,
};
