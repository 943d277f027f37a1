//! Audio capture and rate conversion.

pub mod capture;
pub mod chunker;
pub mod source;

pub use capture::{CpalAudioSource, list_devices, suppress_audio_warnings};
pub use chunker::{ChunkAssembler, Resampler};
pub use source::{AudioSource, FramePhase, MockAudioSource};
