//! Text-similarity duplicate suppressor.
//!
//! A coarse safety net behind the timeline merger, mainly for very short
//! chunks: the last few emitted strings are kept with timestamps, and a
//! candidate close enough to a recent one within the cooldown window is
//! suppressed.

use crate::clock::{Clock, SystemClock};
use crate::merge::stitcher::similarity;
use log::debug;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of recent emissions remembered.
const HISTORY_LEN: usize = 6;

/// Configuration slice for the suppressor.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    pub similarity_threshold: f64,
    pub cooldown: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: crate::defaults::SIMILARITY_THRESHOLD,
            cooldown: Duration::from_secs_f32(crate::defaults::DUPLICATE_COOLDOWN_S),
        }
    }
}

/// Ring of recent emissions with their times.
pub struct DuplicateSuppressor {
    config: DedupConfig,
    recent: VecDeque<(String, Instant)>,
    clock: Arc<dyn Clock>,
}

impl DuplicateSuppressor {
    pub fn new(config: DedupConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: DedupConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            recent: VecDeque::with_capacity(HISTORY_LEN),
            clock,
        }
    }

    /// Returns true when the candidate should be suppressed; otherwise
    /// records it and lets it through.
    pub fn check(&mut self, candidate: &str) -> bool {
        let now = self.clock.now();

        let duplicate = self.recent.iter().any(|(prior, at)| {
            now.duration_since(*at) < self.config.cooldown
                && similarity(candidate, prior) >= self.config.similarity_threshold
        });
        if duplicate {
            debug!("suppress duplicate text={:?}", candidate);
            return true;
        }

        if self.recent.len() == HISTORY_LEN {
            self.recent.pop_front();
        }
        self.recent.push_back((candidate.to_string(), now));
        false
    }
}
