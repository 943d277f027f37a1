//! Voice activity detection over chunk windows.
//!
//! Classification runs in three tiers: an RMS fast path against the adaptive
//! noise floor, a zero-crossing-rate band check, and (in accurate mode) a
//! spectral-entropy check. Tonal signals like speech concentrate spectral
//! energy and score low entropy; broadband noise scores high.

use crate::config::VadMode;
use crate::vad::noise_floor::calculate_rms;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Per-chunk classification with the features that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadDecision {
    pub is_speech: bool,
    pub rms: f32,
    /// Absent on the RMS fast path.
    pub zcr: Option<f32>,
    /// Absent on the fast path and in fast mode.
    pub spectral_entropy: Option<f32>,
}

/// Configuration slice for the detector.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    pub enabled: bool,
    pub mode: VadMode,
    pub zcr_min: f32,
    pub zcr_max: f32,
    pub entropy_max: f32,
    pub rms_margin: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: VadMode::Accurate,
            zcr_min: crate::defaults::VAD_ZCR_MIN,
            zcr_max: crate::defaults::VAD_ZCR_MAX,
            entropy_max: crate::defaults::VAD_ENTROPY_MAX,
            rms_margin: crate::defaults::RMS_MARGIN,
        }
    }
}

/// Voice activity detector operating on full chunk windows.
pub struct VoiceActivityDetector {
    config: VadConfig,
    planner: FftPlanner<f32>,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            planner: FftPlanner::new(),
        }
    }

    /// Classify one chunk against the current noise floor.
    pub fn assess(&mut self, samples: &[f32], noise_floor: f32) -> VadDecision {
        let rms = calculate_rms(samples);

        if !self.config.enabled {
            return VadDecision {
                is_speech: true,
                rms,
                zcr: None,
                spectral_entropy: None,
            };
        }

        // Fast path: energy at or below the floor cannot be speech.
        if rms <= noise_floor + self.config.rms_margin {
            return VadDecision {
                is_speech: false,
                rms,
                zcr: None,
                spectral_entropy: None,
            };
        }

        let zcr = zero_crossing_rate(samples);
        let zcr_in_band = zcr >= self.config.zcr_min && zcr <= self.config.zcr_max;

        match self.config.mode {
            VadMode::Fast => VadDecision {
                is_speech: zcr_in_band,
                rms,
                zcr: Some(zcr),
                spectral_entropy: None,
            },
            VadMode::Accurate => {
                let entropy = self.spectral_entropy(samples);
                VadDecision {
                    is_speech: zcr_in_band || entropy <= self.config.entropy_max,
                    rms,
                    zcr: Some(zcr),
                    spectral_entropy: Some(entropy),
                }
            }
        }
    }

    /// Normalized Shannon entropy of the power spectrum over non-zero bins.
    fn spectral_entropy(&mut self, samples: &[f32]) -> f32 {
        if samples.len() < 2 {
            return 0.0;
        }

        let fft = self.planner.plan_fft_forward(samples.len());
        let mut buffer: Vec<Complex<f32>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        fft.process(&mut buffer);

        // Real input: keep the one-sided spectrum.
        let half = samples.len() / 2 + 1;
        let power: Vec<f64> = buffer[..half]
            .iter()
            .map(|c| f64::from(c.norm_sqr()))
            .collect();

        let total: f64 = power.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }

        let nonzero: Vec<f64> = power
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| p / total)
            .collect();
        if nonzero.len() <= 1 {
            return 0.0;
        }

        let entropy: f64 = -nonzero.iter().map(|&p| p * p.log2()).sum::<f64>();
        (entropy / (nonzero.len() as f64).log2()) as f32
    }
}

/// Fraction of adjacent sample pairs with opposite signs.
pub fn zero_crossing_rate(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| pair[0] * pair[1] < 0.0)
        .count();
    crossings as f32 / samples.len() as f32
}
