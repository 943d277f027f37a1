//! Typed runtime configuration, built once at startup from environment
//! variables.
//!
//! Invalid values fail fast with a configuration error (exit code 2) instead
//! of being silently clamped.

use crate::decode::metadata::Language;
use crate::defaults;
use crate::error::{LivesenseError, Result};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Voice-activity detection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadMode {
    /// RMS + zero-crossing rate only.
    Fast,
    /// RMS + ZCR + spectral entropy.
    Accurate,
}

impl FromStr for VadMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(VadMode::Fast),
            "accurate" => Ok(VadMode::Accurate),
            other => Err(format!("unknown VAD mode '{}'", other)),
        }
    }
}

/// Language selection: automatic detection or a fixed language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSelection {
    Auto,
    Fixed(Language),
}

impl FromStr for LanguageSelection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(LanguageSelection::Auto);
        }
        Language::from_code(s)
            .map(LanguageSelection::Fixed)
            .ok_or_else(|| format!("unknown language '{}'", s))
    }
}

/// Immutable session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Model artifacts
    pub model_path: Option<PathBuf>,
    pub embedding_path: Option<PathBuf>,
    pub bpe_path: Option<PathBuf>,
    pub cmvn_path: Option<PathBuf>,

    // Windowing
    pub chunk_duration_s: f32,
    pub overlap_duration_s: f32,

    // Capture
    pub audio_device: Option<String>,

    // Language / normalization
    pub language: LanguageSelection,
    pub use_itn: bool,

    // Logging
    pub log_level: String,

    // VAD
    pub enable_vad: bool,
    pub vad_mode: VadMode,
    pub vad_zcr_min: f32,
    pub vad_zcr_max: f32,
    pub vad_entropy_max: f32,
    pub rms_margin: f32,
    pub noise_calib_secs: f32,
    pub adaptive_noise_floor: bool,

    // Duplicate suppression
    pub similarity_threshold: f64,
    pub duplicate_cooldown_s: f32,
    pub min_chars: usize,

    // Boundary stitching
    pub enable_confidence_stitching: bool,
    pub confidence_threshold: f32,
    pub overlap_word_count: usize,

    // Timeline merging
    pub enable_timeline_merging: bool,
    pub timeline_min_word_confidence: f32,
    pub timeline_overlap_confidence: f32,
    pub timeline_confidence_replacement: bool,

    // Language auto-lock
    pub enable_language_lock: bool,
    pub language_lock_warmup_s: f32,
    pub language_lock_min_samples: usize,
    pub language_lock_confidence: f32,

    // Output filtering / decoration
    pub filter_bgm: bool,
    pub filter_events: Vec<String>,
    pub show_emotions: bool,
    pub show_events: bool,
    pub show_language: bool,

    // Broadcast
    pub websocket_host: String,
    pub websocket_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: None,
            embedding_path: None,
            bpe_path: None,
            cmvn_path: None,
            chunk_duration_s: defaults::CHUNK_DURATION_S,
            overlap_duration_s: defaults::OVERLAP_DURATION_S,
            audio_device: None,
            language: LanguageSelection::Auto,
            use_itn: true,
            log_level: "INFO".to_string(),
            enable_vad: true,
            vad_mode: VadMode::Accurate,
            vad_zcr_min: defaults::VAD_ZCR_MIN,
            vad_zcr_max: defaults::VAD_ZCR_MAX,
            vad_entropy_max: defaults::VAD_ENTROPY_MAX,
            rms_margin: defaults::RMS_MARGIN,
            noise_calib_secs: defaults::NOISE_CALIB_SECS,
            adaptive_noise_floor: true,
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
            duplicate_cooldown_s: defaults::DUPLICATE_COOLDOWN_S,
            min_chars: defaults::MIN_CHARS,
            enable_confidence_stitching: true,
            confidence_threshold: defaults::CONFIDENCE_THRESHOLD,
            overlap_word_count: defaults::OVERLAP_WORD_COUNT,
            enable_timeline_merging: true,
            timeline_min_word_confidence: defaults::TIMELINE_MIN_WORD_CONFIDENCE,
            timeline_overlap_confidence: defaults::TIMELINE_OVERLAP_CONFIDENCE,
            timeline_confidence_replacement: true,
            enable_language_lock: true,
            language_lock_warmup_s: defaults::LANGUAGE_LOCK_WARMUP_S,
            language_lock_min_samples: defaults::LANGUAGE_LOCK_MIN_SAMPLES,
            language_lock_confidence: defaults::LANGUAGE_LOCK_CONFIDENCE,
            filter_bgm: false,
            filter_events: Vec::new(),
            show_emotions: false,
            show_events: true,
            show_language: true,
            websocket_host: defaults::WEBSOCKET_HOST.to_string(),
            websocket_port: defaults::WEBSOCKET_PORT,
        }
    }
}

/// Parse an environment variable into `T`, failing with a configuration
/// error naming the variable when the value doesn't parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => {
            raw.parse::<T>()
                .map(Some)
                .map_err(|e| LivesenseError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}

fn env_bool(key: &str) -> Result<Option<bool>> {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            other => Err(LivesenseError::ConfigInvalidValue {
                key: key.to_string(),
                message: format!("expected true/false, got '{}'", other),
            }),
        },
        _ => Ok(None),
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

macro_rules! apply {
    ($cfg:expr, $field:ident, $value:expr) => {
        if let Some(v) = $value {
            $cfg.$field = v;
        }
    };
}

impl Config {
    /// Build the configuration from environment variables, validating as it
    /// goes.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Config::default();

        cfg.model_path = env_path("MODEL_PATH");
        cfg.embedding_path = env_path("EMBEDDING_PATH");
        cfg.bpe_path = env_path("BPE_PATH");
        cfg.cmvn_path = env_path("CMVN_PATH");
        cfg.audio_device = std::env::var("AUDIO_DEVICE").ok().filter(|v| !v.is_empty());

        apply!(cfg, chunk_duration_s, env_parse::<f32>("CHUNK_DURATION")?);
        apply!(cfg, overlap_duration_s, env_parse::<f32>("OVERLAP_DURATION")?);
        apply!(cfg, language, env_parse::<LanguageSelection>("LANGUAGE")?);
        apply!(cfg, use_itn, env_bool("USE_ITN")?);
        apply!(cfg, log_level, env_parse::<String>("LOG_LEVEL")?);
        apply!(cfg, enable_vad, env_bool("ENABLE_VAD")?);
        apply!(cfg, vad_mode, env_parse::<VadMode>("VAD_MODE")?);
        apply!(cfg, vad_zcr_min, env_parse::<f32>("VAD_ZCR_MIN")?);
        apply!(cfg, vad_zcr_max, env_parse::<f32>("VAD_ZCR_MAX")?);
        apply!(cfg, vad_entropy_max, env_parse::<f32>("VAD_ENTROPY_MAX")?);
        apply!(cfg, rms_margin, env_parse::<f32>("RMS_MARGIN")?);
        apply!(cfg, noise_calib_secs, env_parse::<f32>("NOISE_CALIB_SECS")?);
        apply!(cfg, adaptive_noise_floor, env_bool("ADAPTIVE_NOISE_FLOOR")?);
        apply!(
            cfg,
            similarity_threshold,
            env_parse::<f64>("SIMILARITY_THRESHOLD")?
        );
        apply!(
            cfg,
            duplicate_cooldown_s,
            env_parse::<f32>("DUPLICATE_COOLDOWN_S")?
        );
        apply!(cfg, min_chars, env_parse::<usize>("MIN_CHARS")?);
        apply!(
            cfg,
            enable_confidence_stitching,
            env_bool("ENABLE_CONFIDENCE_STITCHING")?
        );
        apply!(
            cfg,
            confidence_threshold,
            env_parse::<f32>("CONFIDENCE_THRESHOLD")?
        );
        apply!(
            cfg,
            overlap_word_count,
            env_parse::<usize>("OVERLAP_WORD_COUNT")?
        );
        apply!(
            cfg,
            enable_timeline_merging,
            env_bool("ENABLE_TIMELINE_MERGING")?
        );
        apply!(
            cfg,
            timeline_min_word_confidence,
            env_parse::<f32>("TIMELINE_MIN_WORD_CONFIDENCE")?
        );
        apply!(
            cfg,
            timeline_overlap_confidence,
            env_parse::<f32>("TIMELINE_OVERLAP_CONFIDENCE")?
        );
        apply!(
            cfg,
            timeline_confidence_replacement,
            env_bool("TIMELINE_CONFIDENCE_REPLACEMENT")?
        );
        apply!(cfg, enable_language_lock, env_bool("ENABLE_LANGUAGE_LOCK")?);
        apply!(
            cfg,
            language_lock_warmup_s,
            env_parse::<f32>("LANGUAGE_LOCK_WARMUP_S")?
        );
        apply!(
            cfg,
            language_lock_min_samples,
            env_parse::<usize>("LANGUAGE_LOCK_MIN_SAMPLES")?
        );
        apply!(
            cfg,
            language_lock_confidence,
            env_parse::<f32>("LANGUAGE_LOCK_CONFIDENCE")?
        );
        apply!(cfg, filter_bgm, env_bool("FILTER_BGM")?);
        apply!(cfg, show_emotions, env_bool("SHOW_EMOTIONS")?);
        apply!(cfg, show_events, env_bool("SHOW_EVENTS")?);
        apply!(cfg, show_language, env_bool("SHOW_LANGUAGE")?);
        apply!(cfg, websocket_host, env_parse::<String>("WEBSOCKET_HOST")?);
        apply!(cfg, websocket_port, env_parse::<u16>("WEBSOCKET_PORT")?);

        if let Ok(raw) = std::env::var("FILTER_EVENTS")
            && !raw.is_empty()
        {
            cfg.filter_events = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate numeric ranges and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: impl Into<String>) -> LivesenseError {
            LivesenseError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.into(),
            }
        }

        if !(self.chunk_duration_s > 0.0) {
            return Err(invalid("CHUNK_DURATION", "must be positive"));
        }
        if self.overlap_duration_s < 0.0 {
            return Err(invalid("OVERLAP_DURATION", "must be non-negative"));
        }
        if self.overlap_duration_s >= self.chunk_duration_s {
            return Err(invalid(
                "OVERLAP_DURATION",
                format!(
                    "overlap {}s must be smaller than chunk duration {}s",
                    self.overlap_duration_s, self.chunk_duration_s
                ),
            ));
        }
        for (key, value) in [
            ("CONFIDENCE_THRESHOLD", self.confidence_threshold),
            (
                "TIMELINE_MIN_WORD_CONFIDENCE",
                self.timeline_min_word_confidence,
            ),
            (
                "TIMELINE_OVERLAP_CONFIDENCE",
                self.timeline_overlap_confidence,
            ),
            ("LANGUAGE_LOCK_CONFIDENCE", self.language_lock_confidence),
            ("VAD_ENTROPY_MAX", self.vad_entropy_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, "must be within [0, 1]"));
            }
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(invalid("SIMILARITY_THRESHOLD", "must be within [0, 1]"));
        }
        if self.vad_zcr_min > self.vad_zcr_max {
            return Err(invalid("VAD_ZCR_MIN", "must not exceed VAD_ZCR_MAX"));
        }
        if !(self.noise_calib_secs > 0.0) {
            return Err(invalid("NOISE_CALIB_SECS", "must be positive"));
        }
        if self.overlap_word_count == 0 {
            return Err(invalid("OVERLAP_WORD_COUNT", "must be at least 1"));
        }
        Ok(())
    }

    /// Hop between consecutive chunk windows in seconds.
    pub fn hop_s(&self) -> f32 {
        self.chunk_duration_s - self.overlap_duration_s
    }

    /// Hop in milliseconds; the global-timeline increment per chunk index.
    pub fn hop_ms(&self) -> f64 {
        f64::from(self.hop_s()) * 1000.0
    }

    /// Chunk window length in milliseconds.
    pub fn chunk_duration_ms(&self) -> f64 {
        f64::from(self.chunk_duration_s) * 1000.0
    }

    /// Chunk window length in samples at the model rate.
    pub fn chunk_samples(&self) -> usize {
        (self.chunk_duration_s * defaults::MODEL_RATE as f32) as usize
    }

    /// Hop length in samples at the model rate.
    pub fn hop_samples(&self) -> usize {
        (self.hop_s() * defaults::MODEL_RATE as f32) as usize
    }

    /// The fixed language when auto-lock is not in play.
    pub fn fixed_language(&self) -> Option<Language> {
        match self.language {
            LanguageSelection::Auto => None,
            LanguageSelection::Fixed(lang) => Some(lang),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    const ALL_KEYS: &[&str] = &[
        "MODEL_PATH",
        "EMBEDDING_PATH",
        "BPE_PATH",
        "CMVN_PATH",
        "AUDIO_DEVICE",
        "CHUNK_DURATION",
        "OVERLAP_DURATION",
        "LANGUAGE",
        "USE_ITN",
        "LOG_LEVEL",
        "ENABLE_VAD",
        "VAD_MODE",
        "VAD_ZCR_MIN",
        "VAD_ZCR_MAX",
        "VAD_ENTROPY_MAX",
        "RMS_MARGIN",
        "NOISE_CALIB_SECS",
        "ADAPTIVE_NOISE_FLOOR",
        "SIMILARITY_THRESHOLD",
        "DUPLICATE_COOLDOWN_S",
        "MIN_CHARS",
        "ENABLE_CONFIDENCE_STITCHING",
        "CONFIDENCE_THRESHOLD",
        "OVERLAP_WORD_COUNT",
        "ENABLE_TIMELINE_MERGING",
        "TIMELINE_MIN_WORD_CONFIDENCE",
        "TIMELINE_OVERLAP_CONFIDENCE",
        "TIMELINE_CONFIDENCE_REPLACEMENT",
        "ENABLE_LANGUAGE_LOCK",
        "LANGUAGE_LOCK_WARMUP_S",
        "LANGUAGE_LOCK_MIN_SAMPLES",
        "LANGUAGE_LOCK_CONFIDENCE",
        "FILTER_BGM",
        "FILTER_EVENTS",
        "SHOW_EMOTIONS",
        "SHOW_EVENTS",
        "SHOW_LANGUAGE",
        "WEBSOCKET_HOST",
        "WEBSOCKET_PORT",
    ];

    fn clear_env() {
        for key in ALL_KEYS {
            remove_env(key);
        }
    }

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.chunk_duration_s, 3.0);
        assert_eq!(config.overlap_duration_s, 1.5);
        assert_eq!(config.language, LanguageSelection::Auto);
        assert!(config.use_itn);
        assert!(config.enable_vad);
        assert_eq!(config.vad_mode, VadMode::Accurate);
        assert_eq!(config.min_chars, 3);
        assert_eq!(config.overlap_word_count, 4);
        assert!(!config.filter_bgm);
        assert!(!config.show_emotions);
        assert!(config.show_events);
        assert!(config.show_language);
    }

    #[test]
    fn test_hop_derivation() {
        let config = Config::default();
        assert!((config.hop_s() - 1.5).abs() < f32::EPSILON);
        assert!((config.hop_ms() - 1500.0).abs() < 1e-9);
        assert_eq!(config.chunk_samples(), 48000);
        assert_eq!(config.hop_samples(), 24000);
    }

    #[test]
    fn test_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("CHUNK_DURATION", "4.0");
        set_env("OVERLAP_DURATION", "2.0");
        set_env("LANGUAGE", "en");
        set_env("VAD_MODE", "fast");
        set_env("FILTER_EVENTS", "BGM, Applause");
        set_env("MIN_CHARS", "5");

        let config = Config::from_env().unwrap();
        assert_eq!(config.chunk_duration_s, 4.0);
        assert_eq!(config.overlap_duration_s, 2.0);
        assert_eq!(
            config.language,
            LanguageSelection::Fixed(Language::English)
        );
        assert_eq!(config.vad_mode, VadMode::Fast);
        assert_eq!(config.filter_events, vec!["BGM", "Applause"]);
        assert_eq!(config.min_chars, 5);

        clear_env();
    }

    #[test]
    fn test_from_env_rejects_bad_number() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("CHUNK_DURATION", "not-a-number");
        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(LivesenseError::ConfigInvalidValue { ref key, .. }) if key == "CHUNK_DURATION"
        ));

        clear_env();
    }

    #[test]
    fn test_from_env_rejects_unknown_language() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("LANGUAGE", "klingon");
        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(LivesenseError::ConfigInvalidValue { ref key, .. }) if key == "LANGUAGE"
        ));

        clear_env();
    }

    #[test]
    fn test_validate_rejects_overlap_ge_chunk() {
        let config = Config {
            chunk_duration_s: 2.0,
            overlap_duration_s: 2.0,
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(
            result,
            Err(LivesenseError::ConfigInvalidValue { ref key, .. }) if key == "OVERLAP_DURATION"
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = Config {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_zcr_band() {
        let config = Config {
            vad_zcr_min: 0.5,
            vad_zcr_max: 0.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bool_parsing_accepts_numeric() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("USE_ITN", "0");
        set_env("FILTER_BGM", "1");
        let config = Config::from_env().unwrap();
        assert!(!config.use_itn);
        assert!(config.filter_bgm);

        clear_env();
    }

    #[test]
    fn test_empty_env_value_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        set_env("CHUNK_DURATION", "");
        let config = Config::from_env().unwrap();
        assert_eq!(config.chunk_duration_s, 3.0);

        clear_env();
    }
}
