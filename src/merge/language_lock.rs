//! Language auto-lock state machine.
//!
//! With `LANGUAGE=auto`, the session starts in a warmup phase collecting
//! language-identification results. Once the warmup time has elapsed with
//! enough samples and a dominant language, the session locks to it and all
//! later feature builds use that language's task query. Locking is terminal
//! for the session. An explicitly configured language bypasses the machine
//! entirely.

use crate::clock::{Clock, SystemClock};
use crate::decode::metadata::Language;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Lock state.
#[derive(Debug, Clone, PartialEq)]
pub enum LockState {
    /// Collecting LID samples.
    Warmup {
        started_at: Option<Instant>,
        samples: HashMap<Language, usize>,
        total: usize,
    },
    /// Locked for the rest of the session.
    Locked { language: Language },
    /// Fixed by configuration; auto-lock disabled.
    Free { language: Option<Language> },
}

/// Configuration slice for the lock.
#[derive(Debug, Clone, Copy)]
pub struct LanguageLockConfig {
    pub enabled: bool,
    pub warmup_s: f32,
    pub min_samples: usize,
    pub confidence: f32,
}

impl Default for LanguageLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warmup_s: crate::defaults::LANGUAGE_LOCK_WARMUP_S,
            min_samples: crate::defaults::LANGUAGE_LOCK_MIN_SAMPLES,
            confidence: crate::defaults::LANGUAGE_LOCK_CONFIDENCE,
        }
    }
}

/// Warmup → lock state machine.
pub struct LanguageLock {
    config: LanguageLockConfig,
    state: LockState,
    clock: Arc<dyn Clock>,
}

impl LanguageLock {
    /// Build the machine for the configured language selection. `None`
    /// means auto-detection.
    pub fn new(config: LanguageLockConfig, fixed: Option<Language>) -> Self {
        Self::with_clock(config, fixed, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: LanguageLockConfig,
        fixed: Option<Language>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = match fixed {
            Some(language) => {
                info!("language fixed to {}", language);
                LockState::Free {
                    language: Some(language),
                }
            }
            None if !config.enabled => LockState::Free { language: None },
            None => LockState::Warmup {
                started_at: None,
                samples: HashMap::new(),
                total: 0,
            },
        };
        Self {
            config,
            state,
            clock,
        }
    }

    /// Record one LID result. Warmup starts at the first detection.
    pub fn record_detection(&mut self, language: Language) {
        let now = self.clock.now();
        let LockState::Warmup {
            started_at,
            samples,
            total,
        } = &mut self.state
        else {
            return;
        };

        let started = *started_at.get_or_insert(now);
        *samples.entry(language).or_insert(0) += 1;
        *total += 1;

        // Lock conditions: warmup elapsed, enough samples, dominant share.
        let elapsed = now.duration_since(started).as_secs_f32();
        if elapsed < self.config.warmup_s || *total < self.config.min_samples {
            return;
        }

        let (&best, &count) = samples
            .iter()
            .max_by_key(|&(_, &count)| count)
            .expect("samples non-empty after increment");
        let share = count as f32 / *total as f32;

        if share >= self.config.confidence {
            info!(
                "language locked language={} share={:.2} samples={}/{}",
                best, share, count, total
            );
            self.state = LockState::Locked { language: best };
        } else {
            debug!(
                "language lock inconclusive best={} share={:.2}, still collecting",
                best, share
            );
        }
    }

    /// Language to condition feature builds on. `None` means the
    /// auto-detect query.
    pub fn active_language(&self) -> Option<Language> {
        match &self.state {
            LockState::Warmup { .. } => None,
            LockState::Locked { language } => Some(*language),
            LockState::Free { language } => *language,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, LockState::Locked { .. })
    }

    pub fn state(&self) -> &LockState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use std::time::Duration;

    fn warmup_lock(clock: &MockClock) -> LanguageLock {
        LanguageLock::with_clock(
            LanguageLockConfig::default(),
            None,
            Arc::new(clock.clone()),
        )
    }

    #[test]
    fn test_fixed_language_is_free_state() {
        let lock = LanguageLock::new(LanguageLockConfig::default(), Some(Language::Korean));
        assert_eq!(lock.active_language(), Some(Language::Korean));
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_disabled_lock_stays_auto() {
        let config = LanguageLockConfig {
            enabled: false,
            ..Default::default()
        };
        let mut lock = LanguageLock::new(config, None);
        for _ in 0..20 {
            lock.record_detection(Language::English);
        }
        assert_eq!(lock.active_language(), None);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_warmup_uses_auto_query() {
        let clock = MockClock::new();
        let lock = warmup_lock(&clock);
        assert_eq!(lock.active_language(), None);
    }

    #[test]
    fn test_locks_after_warmup_with_dominant_language() {
        let clock = MockClock::new();
        let mut lock = warmup_lock(&clock);

        // Scenario: en, en, en, zh, en over the warmup window.
        for lang in [
            Language::English,
            Language::English,
            Language::English,
            Language::Chinese,
        ] {
            lock.record_detection(lang);
        }
        assert!(!lock.is_locked(), "warmup time not elapsed yet");

        clock.advance(Duration::from_secs(11));
        lock.record_detection(Language::English);

        // 4/5 = 0.8 >= 0.6 → locked to English.
        assert!(lock.is_locked());
        assert_eq!(lock.active_language(), Some(Language::English));
    }

    #[test]
    fn test_lock_is_terminal() {
        let clock = MockClock::new();
        let mut lock = warmup_lock(&clock);

        clock.advance(Duration::from_secs(1));
        lock.record_detection(Language::English);
        clock.advance(Duration::from_secs(11));
        lock.record_detection(Language::English);
        lock.record_detection(Language::English);
        assert!(lock.is_locked());

        // Momentary disagreement cannot unlock or flip the language.
        for _ in 0..50 {
            lock.record_detection(Language::Chinese);
        }
        assert_eq!(lock.active_language(), Some(Language::English));
    }

    #[test]
    fn test_insufficient_confidence_keeps_collecting() {
        let clock = MockClock::new();
        let mut lock = warmup_lock(&clock);

        lock.record_detection(Language::English);
        lock.record_detection(Language::Chinese);
        clock.advance(Duration::from_secs(11));
        lock.record_detection(Language::Japanese);
        lock.record_detection(Language::Korean);

        // Best share is 1/4 = 0.25 < 0.6: remain in warmup.
        assert!(!lock.is_locked());
        assert_eq!(lock.active_language(), None);

        // A later clear majority still locks.
        for _ in 0..10 {
            lock.record_detection(Language::English);
        }
        assert!(lock.is_locked());
        assert_eq!(lock.active_language(), Some(Language::English));
    }

    #[test]
    fn test_min_samples_gate() {
        let clock = MockClock::new();
        let mut lock = warmup_lock(&clock);

        lock.record_detection(Language::English);
        clock.advance(Duration::from_secs(11));
        lock.record_detection(Language::English);
        // Only 2 samples < min 3.
        assert!(!lock.is_locked());

        lock.record_detection(Language::English);
        assert!(lock.is_locked());
    }

    #[test]
    fn test_warmup_starts_at_first_detection() {
        let clock = MockClock::new();
        let mut lock = warmup_lock(&clock);

        // Idle time before any detection must not count as warmup.
        clock.advance(Duration::from_secs(60));
        lock.record_detection(Language::English);
        lock.record_detection(Language::English);
        lock.record_detection(Language::English);
        assert!(!lock.is_locked(), "warmup clock starts at first sample");

        clock.advance(Duration::from_secs(11));
        lock.record_detection(Language::English);
        assert!(lock.is_locked());
    }
}
