//! Exact-duplicate short-circuit for resampled chunks.
//!
//! Overlapping windows over long silence stretches occasionally repeat a
//! byte-identical resampled payload. Hashing each chunk and keeping a short
//! cache of recent digests lets the pipeline skip the encoder call for an
//! exact repeat.

use md5::{Digest, Md5};
use std::collections::VecDeque;

/// Number of recent fingerprints remembered.
const CACHE_LEN: usize = 10;

/// 128-bit digest of a chunk's sample bytes.
pub type Fingerprint = [u8; 16];

/// Compute the digest of a resampled sample window.
pub fn fingerprint(samples: &[f32]) -> Fingerprint {
    let mut hasher = Md5::new();
    for &sample in samples {
        hasher.update(sample.to_le_bytes());
    }
    hasher.finalize().into()
}

/// Ordered cache of the most recent chunk fingerprints.
pub struct ChunkFingerprinter {
    recent: VecDeque<Fingerprint>,
}

impl ChunkFingerprinter {
    pub fn new() -> Self {
        Self {
            recent: VecDeque::with_capacity(CACHE_LEN),
        }
    }

    /// Record the chunk and report whether it repeats a recent one.
    ///
    /// Returns true on a cache hit (the caller should drop the chunk).
    pub fn check(&mut self, samples: &[f32]) -> bool {
        let digest = fingerprint(samples);
        if self.recent.contains(&digest) {
            return true;
        }
        if self.recent.len() == CACHE_LEN {
            self.recent.pop_front();
        }
        self.recent.push_back(digest);
        false
    }
}

impl Default for ChunkFingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_chunks_hash_equal() {
        let a = vec![0.1f32, -0.2, 0.3];
        let b = vec![0.1f32, -0.2, 0.3];
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_different_chunks_hash_differently() {
        let a = vec![0.1f32, -0.2, 0.3];
        let b = vec![0.1f32, -0.2, 0.30001];
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_repeat_within_window_is_hit() {
        let mut fp = ChunkFingerprinter::new();
        let chunk = vec![0.5f32; 100];

        assert!(!fp.check(&chunk));
        assert!(fp.check(&chunk));
    }

    #[test]
    fn test_cache_evicts_after_ten_chunks() {
        let mut fp = ChunkFingerprinter::new();
        let first = vec![1.0f32; 10];

        assert!(!fp.check(&first));

        // Ten distinct chunks push the first one out.
        for i in 0..10 {
            let chunk = vec![i as f32 * 0.01; 10];
            assert!(!fp.check(&chunk));
        }

        assert!(!fp.check(&first), "evicted fingerprint must miss");
    }

    #[test]
    fn test_distinct_chunks_never_hit() {
        let mut fp = ChunkFingerprinter::new();
        for i in 0..50 {
            let chunk = vec![i as f32; 8];
            assert!(!fp.check(&chunk));
        }
    }
}
