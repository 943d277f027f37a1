//! Voice activity detection with an adaptive noise floor.

pub mod detector;
pub mod noise_floor;

pub use detector::{VadConfig, VadDecision, VoiceActivityDetector, zero_crossing_rate};
pub use noise_floor::{CalibrationState, NoiseFloorCalibrator, calculate_rms};
