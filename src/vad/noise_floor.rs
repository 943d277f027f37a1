//! Adaptive noise-floor estimation.
//!
//! Two phases: a bootstrap that derives the initial floor from the first
//! stretch of captured audio, and an adaptive phase that re-estimates the
//! floor from chunks the detector classified as non-speech. Speech chunks
//! never move the floor.

use log::{debug, info};
use std::collections::VecDeque;

/// Bounded history length of non-speech RMS observations.
const HISTORY_LEN: usize = 100;

/// Adaptive refresh period: re-median the history every this many updates.
const REFRESH_EVERY: usize = 50;

/// Sub-window length used during bootstrap, in seconds.
const BOOTSTRAP_WINDOW_S: f32 = 0.05;

/// Root mean square of a normalized sample window.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    ((sum_squares / samples.len() as f64) + 1e-12).sqrt() as f32
}

fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Calibration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Uncalibrated,
    Calibrating,
    Calibrated,
}

/// Maintains the adaptive RMS noise floor.
pub struct NoiseFloorCalibrator {
    value: f32,
    state: CalibrationState,
    history: VecDeque<f32>,
    updates_since_refresh: usize,
    bootstrap_buffer: Vec<f32>,
    bootstrap_target: usize,
    window_samples: usize,
    adaptive: bool,
}

impl NoiseFloorCalibrator {
    /// # Arguments
    /// * `calib_secs` - seconds of audio consumed by the bootstrap
    /// * `sample_rate` - rate of the samples fed to `bootstrap`
    /// * `adaptive` - whether non-speech observations keep updating the floor
    pub fn new(calib_secs: f32, sample_rate: u32, adaptive: bool) -> Self {
        Self {
            value: 0.0,
            state: CalibrationState::Uncalibrated,
            history: VecDeque::with_capacity(HISTORY_LEN),
            updates_since_refresh: 0,
            bootstrap_buffer: Vec::new(),
            bootstrap_target: (calib_secs * sample_rate as f32) as usize,
            window_samples: (BOOTSTRAP_WINDOW_S * sample_rate as f32).max(1.0) as usize,
            adaptive,
        }
    }

    /// Feed bootstrap audio. Returns true once calibration completed.
    pub fn bootstrap(&mut self, samples: &[f32]) -> bool {
        if self.state == CalibrationState::Calibrated {
            return true;
        }
        self.state = CalibrationState::Calibrating;
        self.bootstrap_buffer.extend_from_slice(samples);

        if self.bootstrap_buffer.len() < self.bootstrap_target {
            return false;
        }

        let window_rms: Vec<f32> = self
            .bootstrap_buffer
            .chunks(self.window_samples)
            .filter(|w| w.len() == self.window_samples)
            .map(calculate_rms)
            .collect();

        self.value = median(&window_rms);
        self.state = CalibrationState::Calibrated;
        self.bootstrap_buffer.clear();
        self.bootstrap_buffer.shrink_to_fit();
        info!("noise floor calibrated value={:.5}", self.value);
        true
    }

    /// Record the RMS of a chunk the detector classified as non-speech.
    ///
    /// The floor itself only moves every [`REFRESH_EVERY`] observations, to
    /// the median of the retained history.
    pub fn observe_non_speech(&mut self, rms: f32) {
        if !self.adaptive || self.state != CalibrationState::Calibrated {
            return;
        }

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(rms);
        self.updates_since_refresh += 1;

        if self.updates_since_refresh >= REFRESH_EVERY {
            let (a, b) = self.history.as_slices();
            let mut all = Vec::with_capacity(self.history.len());
            all.extend_from_slice(a);
            all.extend_from_slice(b);
            self.value = median(&all);
            self.updates_since_refresh = 0;
            debug!("noise floor refreshed value={:.5}", self.value);
        }
    }

    /// Current floor estimate.
    pub fn noise_floor(&self) -> f32 {
        self.value
    }

    pub fn is_calibrated(&self) -> bool {
        self.state == CalibrationState::Calibrated
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Bootstrap progress in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.state == CalibrationState::Calibrated {
            return 1.0;
        }
        if self.bootstrap_target == 0 {
            return 0.0;
        }
        (self.bootstrap_buffer.len() as f32 / self.bootstrap_target as f32).min(1.0)
    }
}
