//! Session telemetry counters.
//!
//! Pure counts live in atomics so any stage can record without locking;
//! the orchestrator prints a summary at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one transcription session.
pub struct SessionStats {
    started_at: Instant,
    pub chunks_processed: AtomicU64,
    pub inference_total_ms: AtomicU64,
    pub inference_count: AtomicU64,
    pub errors: AtomicU64,
    pub vad_dropped: AtomicU64,
    pub fingerprint_hits: AtomicU64,
    pub filtered_by_event: AtomicU64,
    pub duplicates_suppressed: AtomicU64,
    pub words_emitted: AtomicU64,
    pub records_broadcast: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            chunks_processed: AtomicU64::new(0),
            inference_total_ms: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            vad_dropped: AtomicU64::new(0),
            fingerprint_hits: AtomicU64::new(0),
            filtered_by_event: AtomicU64::new(0),
            duplicates_suppressed: AtomicU64::new(0),
            words_emitted: AtomicU64::new(0),
            records_broadcast: AtomicU64::new(0),
        }
    }

    pub fn record_inference(&self, elapsed_ms: u64) {
        self.inference_total_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_inference_ms(&self) -> f64 {
        let count = self.inference_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.inference_total_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    pub fn error_rate(&self) -> f64 {
        let chunks = self.chunks_processed.load(Ordering::Relaxed);
        if chunks == 0 {
            return 0.0;
        }
        self.errors.load(Ordering::Relaxed) as f64 / chunks as f64
    }

    /// Multi-line shutdown summary.
    pub fn summary(&self) -> String {
        let runtime = self.started_at.elapsed().as_secs_f64();
        let chunks = self.chunks_processed.load(Ordering::Relaxed);
        let chunks_per_s = if runtime > 0.0 {
            chunks as f64 / runtime
        } else {
            0.0
        };
        format!(
            "session runtime={:.1}s chunks={} chunks_per_s={:.2} avg_inference={:.1}ms \
             words={} vad_dropped={} fingerprint_hits={} filtered={} duplicates={} \
             errors={} error_rate={:.1}%",
            runtime,
            chunks,
            chunks_per_s,
            self.avg_inference_ms(),
            self.words_emitted.load(Ordering::Relaxed),
            self.vad_dropped.load(Ordering::Relaxed),
            self.fingerprint_hits.load(Ordering::Relaxed),
            self.filtered_by_event.load(Ordering::Relaxed),
            self.duplicates_suppressed.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
            self.error_rate() * 100.0,
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}
