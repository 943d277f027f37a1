//! Inference station: one thread runs the whole chunk-to-words path.
//!
//! Single-threaded by design: the encoder client is single-reader and the
//! timeline is a single-owner structure. Every chunk resolves to an explicit
//! outcome (emitted, dropped with a reason, or a counted transient error);
//! sustained failure escalates to a fatal station error.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::decode::ctc::CtcDecoder;
use crate::decode::encoder::EncoderClient;
use crate::decode::features::FeatureBuilder;
use crate::decode::fingerprint::ChunkFingerprinter;
use crate::defaults;
use crate::merge::dedup::{DedupConfig, DuplicateSuppressor};
use crate::merge::language_lock::{LanguageLock, LanguageLockConfig};
use crate::merge::stitcher::{ConfidenceStitcher, StitcherConfig};
use crate::merge::timeline::{TimelineConfig, TimelineMerger};
use crate::pipeline::formatter::OutputFormatter;
use crate::pipeline::station::{Station, StationError};
use crate::pipeline::types::{AudioChunk, ChunkOutcome, DropReason, Emission};
use crate::stats::SessionStats;
use crate::vad::detector::{VadConfig, VoiceActivityDetector};
use crate::vad::noise_floor::NoiseFloorCalibrator;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Outcomes younger than this feed the error-rate check.
const ERROR_WINDOW: Duration = Duration::from_secs(60);

/// Minimum outcomes in the window before the rate rule applies.
const ERROR_WINDOW_MIN_SAMPLES: usize = 10;

/// The single-threaded chunk-to-words stage.
pub struct InferenceStation {
    calibrator: NoiseFloorCalibrator,
    vad: VoiceActivityDetector,
    fingerprinter: ChunkFingerprinter,
    feature_builder: FeatureBuilder,
    encoder: Box<dyn EncoderClient>,
    decoder: CtcDecoder,
    language_lock: LanguageLock,
    stitcher: ConfidenceStitcher,
    timeline: TimelineMerger,
    timeline_enabled: bool,
    dedup: DuplicateSuppressor,
    formatter: OutputFormatter,
    stats: Arc<SessionStats>,
    chunk_duration_ms: f64,
    consecutive_errors: usize,
    outcomes: VecDeque<(Instant, bool)>,
    clock: Arc<dyn Clock>,
}

impl InferenceStation {
    pub fn new(
        config: &Config,
        encoder: Box<dyn EncoderClient>,
        feature_builder: FeatureBuilder,
        decoder: CtcDecoder,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self::with_clock(
            config,
            encoder,
            feature_builder,
            decoder,
            stats,
            Arc::new(SystemClock),
        )
    }

    /// Build with an injectable clock for deterministic tests.
    pub fn with_clock(
        config: &Config,
        encoder: Box<dyn EncoderClient>,
        feature_builder: FeatureBuilder,
        decoder: CtcDecoder,
        stats: Arc<SessionStats>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let vad_config = VadConfig {
            enabled: config.enable_vad,
            mode: config.vad_mode,
            zcr_min: config.vad_zcr_min,
            zcr_max: config.vad_zcr_max,
            entropy_max: config.vad_entropy_max,
            rms_margin: config.rms_margin,
        };
        let lock_config = LanguageLockConfig {
            enabled: config.enable_language_lock,
            warmup_s: config.language_lock_warmup_s,
            min_samples: config.language_lock_min_samples,
            confidence: config.language_lock_confidence,
        };
        let stitcher_config = StitcherConfig {
            enabled: config.enable_confidence_stitching,
            confidence_threshold: config.confidence_threshold,
            overlap_word_count: config.overlap_word_count,
        };
        let timeline_config = TimelineConfig {
            min_word_confidence: config.timeline_min_word_confidence,
            overlap_confidence: config.timeline_overlap_confidence,
            confidence_replacement: config.timeline_confidence_replacement,
        };
        let dedup_config = DedupConfig {
            similarity_threshold: config.similarity_threshold,
            cooldown: Duration::from_secs_f32(config.duplicate_cooldown_s),
        };

        Self {
            calibrator: NoiseFloorCalibrator::new(
                config.noise_calib_secs,
                defaults::MODEL_RATE,
                config.adaptive_noise_floor,
            ),
            vad: VoiceActivityDetector::new(vad_config),
            fingerprinter: ChunkFingerprinter::new(),
            feature_builder,
            encoder,
            decoder,
            language_lock: LanguageLock::with_clock(
                lock_config,
                config.fixed_language(),
                clock.clone(),
            ),
            stitcher: ConfidenceStitcher::new(stitcher_config),
            timeline: TimelineMerger::new(timeline_config),
            timeline_enabled: config.enable_timeline_merging,
            dedup: DuplicateSuppressor::with_clock(dedup_config, clock.clone()),
            formatter: OutputFormatter::new(config),
            stats,
            chunk_duration_ms: config.chunk_duration_ms(),
            consecutive_errors: 0,
            outcomes: VecDeque::new(),
            clock,
        }
    }

    fn process_chunk(&mut self, chunk: AudioChunk) -> ChunkOutcome {
        self.stats.chunks_processed.fetch_add(1, Ordering::Relaxed);

        // Calibration consumes chunks until the floor is bootstrapped.
        if !self.calibrator.is_calibrated() {
            if self.calibrator.bootstrap(&chunk.samples) {
                info!("noise calibration complete, speech path enabled");
            }
            return ChunkOutcome::Dropped(DropReason::Calibrating);
        }

        let decision = self
            .vad
            .assess(&chunk.samples, self.calibrator.noise_floor());
        if !decision.is_speech {
            debug!(
                "chunk={} skip rms={:.4} zcr={:?} entropy={:?}",
                chunk.chunk_index, decision.rms, decision.zcr, decision.spectral_entropy
            );
            self.calibrator.observe_non_speech(decision.rms);
            self.stats.vad_dropped.fetch_add(1, Ordering::Relaxed);
            return ChunkOutcome::Dropped(DropReason::NoSpeech);
        }

        if self.fingerprinter.check(&chunk.samples) {
            self.stats.fingerprint_hits.fetch_add(1, Ordering::Relaxed);
            return ChunkOutcome::Dropped(DropReason::DuplicateChunk);
        }

        let language = self.language_lock.active_language();
        let features = match self.feature_builder.build(&chunk.samples, language) {
            Ok(features) => features,
            Err(e) => return ChunkOutcome::Error(format!("feature build: {}", e)),
        };

        let started = Instant::now();
        let output = match self.encoder.infer(&features.tensor) {
            Ok(output) => output,
            Err(e) => return ChunkOutcome::Error(format!("inference: {}", e)),
        };
        self.stats
            .record_inference(started.elapsed().as_millis() as u64);

        let result = match self
            .decoder
            .decode(&output, features.query_rows, self.chunk_duration_ms)
        {
            Ok(result) => result,
            Err(e) => return ChunkOutcome::Error(format!("decode: {}", e)),
        };
        self.record_success();

        if result.is_empty() {
            return ChunkOutcome::Dropped(DropReason::SilentDecode);
        }

        if let Some(language) = result.metadata.language {
            self.language_lock.record_detection(language);
        }

        if let Some(reason) = self.formatter.event_filter_reason(&result) {
            debug!("chunk={} filtered: {}", chunk.chunk_index, reason);
            self.stats.filtered_by_event.fetch_add(1, Ordering::Relaxed);
            return ChunkOutcome::Dropped(DropReason::Filtered);
        }

        let stitched = self
            .stitcher
            .process(result.words.clone(), result.avg_confidence);

        let (text, new_words, confidence) = if self.timeline_enabled {
            let new_words = self.timeline.merge_chunk(&stitched, chunk.start_time_ms);
            if new_words.is_empty() {
                return ChunkOutcome::Dropped(DropReason::NoNewWords);
            }
            let text = new_words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let confidence =
                new_words.iter().map(|w| w.confidence).sum::<f32>() / new_words.len() as f32;
            (text, new_words, confidence)
        } else {
            let text = stitched
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            (text, Vec::new(), result.avg_confidence)
        };

        if !self.formatter.has_enough_content(&text) {
            return ChunkOutcome::Dropped(DropReason::BelowMinChars);
        }

        if self.dedup.check(&text) {
            self.stats
                .duplicates_suppressed
                .fetch_add(1, Ordering::Relaxed);
            return ChunkOutcome::Dropped(DropReason::DuplicateText);
        }

        ChunkOutcome::Emitted(Box::new(self.formatter.emission(
            &text,
            &result,
            new_words,
            confidence,
        )))
    }

    fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.push_outcome(false);
    }

    /// Count a transient failure; returns the fatal escalation when the
    /// budget is exhausted.
    fn record_failure(&mut self, message: &str) -> Option<StationError> {
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        self.consecutive_errors += 1;
        self.push_outcome(true);

        if self.consecutive_errors >= defaults::MAX_CONSECUTIVE_ERRORS {
            return Some(StationError::Fatal(format!(
                "{} consecutive chunk failures, last: {}",
                self.consecutive_errors, message
            )));
        }

        let errors = self.outcomes.iter().filter(|(_, failed)| *failed).count();
        if self.outcomes.len() >= ERROR_WINDOW_MIN_SAMPLES {
            let rate = errors as f32 / self.outcomes.len() as f32;
            if rate > defaults::MAX_ERROR_RATE {
                return Some(StationError::Fatal(format!(
                    "error rate {:.0}% over the last minute, last: {}",
                    rate * 100.0,
                    message
                )));
            }
        }
        None
    }

    fn push_outcome(&mut self, failed: bool) {
        let now = self.clock.now();
        self.outcomes.push_back((now, failed));
        while let Some(&(at, _)) = self.outcomes.front() {
            if now.duration_since(at) > ERROR_WINDOW {
                self.outcomes.pop_front();
            } else {
                break;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn timeline_text(&self) -> String {
        self.timeline.timeline_text()
    }
}

impl Station for InferenceStation {
    type Input = AudioChunk;
    type Output = Emission;

    fn name(&self) -> &'static str {
        "inference"
    }

    fn process(&mut self, chunk: AudioChunk) -> Result<Vec<Emission>, StationError> {
        let index = chunk.chunk_index;
        match self.process_chunk(chunk) {
            ChunkOutcome::Emitted(emission) => {
                self.stats
                    .words_emitted
                    .fetch_add(emission.new_words.len() as u64, Ordering::Relaxed);
                Ok(vec![*emission])
            }
            ChunkOutcome::Dropped(reason) => {
                debug!("chunk={} dropped reason={:?}", index, reason);
                Ok(Vec::new())
            }
            ChunkOutcome::Error(message) => {
                warn!("chunk={} error: {}", index, message);
                match self.record_failure(&message) {
                    Some(fatal) => Err(fatal),
                    None => Ok(Vec::new()),
                }
            }
        }
    }

    fn shutdown(&mut self) {
        info!("{}", self.stats.summary());
    }
}
