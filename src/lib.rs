//! livesense - live microphone transcription for multi-task speech encoders.
//!
//! Continuous low-latency speech-to-text over overlapped audio windows,
//! with voice-activity gating, CTC decoding, confidence-gated boundary
//! stitching, and a monotonically-growing word timeline broadcast over
//! WebSocket.

pub mod app;
pub mod audio;
pub mod clock;
pub mod config;
pub mod decode;
pub mod defaults;
pub mod error;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod stats;
pub mod vad;
