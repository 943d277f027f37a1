//! Default configuration constants for livesense.
//!
//! Shared constants used across configuration types to ensure consistency
//! and eliminate duplication.

/// Sample rate expected by the encoder, in Hz.
///
/// 16kHz is the standard for speech recognition models and the rate all
/// internal processing runs at after resampling.
pub const MODEL_RATE: u32 = 16000;

/// Default chunk window length in seconds.
pub const CHUNK_DURATION_S: f32 = 3.0;

/// Default window overlap in seconds. The hop (global-time increment per
/// chunk) is `chunk_duration - overlap`.
pub const OVERLAP_DURATION_S: f32 = 1.5;

/// Sample rates probed on the capture device, in preference order.
pub const PROBE_RATES: &[u32] = &[16000, 48000, 44100, 32000, 22050, 8000];

/// RMS margin above the noise floor before a chunk can count as speech.
pub const RMS_MARGIN: f32 = 0.004;

/// Seconds of audio consumed by the noise-floor bootstrap.
pub const NOISE_CALIB_SECS: f32 = 1.5;

/// Zero-crossing-rate band for speech.
pub const VAD_ZCR_MIN: f32 = 0.02;
pub const VAD_ZCR_MAX: f32 = 0.35;

/// Maximum normalized spectral entropy for speech (accurate mode only).
pub const VAD_ENTROPY_MAX: f32 = 0.85;

/// Similarity threshold for the text-level duplicate suppressor.
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Window within which a near-identical emit is suppressed, in seconds.
pub const DUPLICATE_COOLDOWN_S: f32 = 4.0;

/// Minimum alphanumeric characters required before a chunk is emitted.
pub const MIN_CHARS: usize = 3;

/// Minimum per-token confidence to keep overlap words when stitching.
pub const CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Words tracked at each chunk boundary for stitching.
pub const OVERLAP_WORD_COUNT: usize = 4;

/// Minimum word confidence for timeline admission.
pub const TIMELINE_MIN_WORD_CONFIDENCE: f32 = 0.4;

/// Confidence margin parameter for boundary-word replacement.
pub const TIMELINE_OVERLAP_CONFIDENCE: f32 = 0.6;

/// Seconds of language-identification warmup before locking.
pub const LANGUAGE_LOCK_WARMUP_S: f32 = 10.0;

/// Minimum LID samples before locking.
pub const LANGUAGE_LOCK_MIN_SAMPLES: usize = 3;

/// Minimum share of samples agreeing on one language to lock.
pub const LANGUAGE_LOCK_CONFIDENCE: f32 = 0.6;

/// Scale applied to acoustic feature rows before inference. Reduced-precision
/// accelerators overflow on full-scale log-mel values; 0.25 keeps the encoder
/// inside its working range.
pub const SPEECH_SCALE: f32 = 0.25;

/// Fixed encoder input length in feature rows (task queries + audio).
pub const ENCODER_INPUT_LEN: usize = 171;

/// Mel filterbank size for acoustic features.
pub const MEL_BINS: usize = 80;

/// Consecutive encoder failures tolerated before the session aborts.
pub const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// Maximum error rate over the trailing minute before the session aborts.
pub const MAX_ERROR_RATE: f32 = 0.25;

/// Channel capacities between pipeline stages.
pub const FRAME_BUFFER: usize = 50;
pub const CHUNK_BUFFER: usize = 4;
pub const RECORD_BUFFER: usize = 100;

/// Seconds each stage may spend draining at shutdown.
pub const DRAIN_TIMEOUT_S: u64 = 2;

/// Default WebSocket bind address.
pub const WEBSOCKET_HOST: &str = "0.0.0.0";
pub const WEBSOCKET_PORT: u16 = 8765;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_is_positive_with_defaults() {
        assert!(CHUNK_DURATION_S > OVERLAP_DURATION_S);
    }

    #[test]
    fn probe_rates_prefer_model_rate() {
        assert_eq!(PROBE_RATES[0], MODEL_RATE);
    }
}
