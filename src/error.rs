//! Error types for livesense.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LivesenseError {
    // Configuration errors (exit code 2)
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    // Environment errors (exit code 3)
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("No supported sample rate on device {device}")]
    UnsupportedRate { device: String },

    #[error("Model file not found at {path}")]
    ModelNotFound { path: String },

    // Model load errors (exit code 4)
    #[error("Model load failed: {message}")]
    ModelLoad { message: String },

    #[error("Tokenizer load failed: {message}")]
    TokenizerLoad { message: String },

    #[error("Embedding load failed: {message}")]
    EmbeddingLoad { message: String },

    // Capture runtime errors (exit code 5)
    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Transient per-chunk errors (non-fatal, counted)
    #[error("Inference failed: {message}")]
    Inference { message: String },

    #[error("Decode failed: {message}")]
    Decode { message: String },

    // Broadcast errors (best-effort)
    #[error("Broadcast failed: {message}")]
    Broadcast { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl LivesenseError {
    /// Process exit code for this error category.
    ///
    /// 2 = bad configuration, 3 = device/runtime unavailable,
    /// 4 = model load failure, 5 = unrecoverable capture failure,
    /// 1 = anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            LivesenseError::ConfigInvalidValue { .. } | LivesenseError::ConfigMissing { .. } => 2,
            LivesenseError::AudioDeviceNotFound { .. }
            | LivesenseError::UnsupportedRate { .. }
            | LivesenseError::ModelNotFound { .. } => 3,
            LivesenseError::ModelLoad { .. }
            | LivesenseError::TokenizerLoad { .. }
            | LivesenseError::EmbeddingLoad { .. } => 4,
            LivesenseError::AudioCapture { .. } => 5,
            _ => 1,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LivesenseError>;
