//! Device-rate to model-rate conversion and chunk assembly.
//!
//! The resampler converts incoming PCM frames to the 16kHz model rate; the
//! assembler maintains a ring buffer of one chunk window and yields one
//! window per hop. Chunk N always begins exactly at `N * hop` samples into
//! the session.

use crate::defaults;

/// Streaming linear resampler from the device rate to the model rate.
///
/// Keeps a one-sample carry between frames so interpolation is continuous
/// across frame boundaries.
pub struct Resampler {
    from_rate: u32,
    to_rate: u32,
    /// Fractional read position relative to the carry sample.
    frac: f64,
    /// Last input sample of the previous frame.
    carry: f32,
}

impl Resampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate,
            to_rate,
            frac: 0.0,
            carry: 0.0,
        }
    }

    /// Convenience constructor targeting the model rate.
    pub fn to_model_rate(from_rate: u32) -> Self {
        Self::new(from_rate, defaults::MODEL_RATE)
    }

    /// Convert one PCM frame to normalized f32 at the target rate.
    pub fn process(&mut self, frame: &[i16]) -> Vec<f32> {
        let input: Vec<f32> = frame.iter().map(|&s| f32::from(s) / 32768.0).collect();

        if self.from_rate == self.to_rate {
            return input;
        }

        let n = input.len();
        if n == 0 {
            return Vec::new();
        }

        let step = f64::from(self.from_rate) / f64::from(self.to_rate);
        let mut out = Vec::with_capacity((n as f64 / step).ceil() as usize + 1);

        // Virtual sample array: v[0] = carry, v[j] = input[j-1].
        let mut pos = self.frac;
        while pos < n as f64 {
            let i = pos as usize;
            let s0 = if i == 0 { self.carry } else { input[i - 1] };
            let s1 = input[i];
            let t = (pos - i as f64) as f32;
            out.push(s0 + (s1 - s0) * t);
            pos += step;
        }

        self.carry = input[n - 1];
        self.frac = pos - n as f64;
        out
    }
}

/// Assembles model-rate samples into fixed windows advanced by the hop.
pub struct ChunkAssembler {
    chunk_samples: usize,
    hop_samples: usize,
    buffer: Vec<f32>,
}

impl ChunkAssembler {
    pub fn new(chunk_samples: usize, hop_samples: usize) -> Self {
        debug_assert!(hop_samples > 0 && hop_samples <= chunk_samples);
        Self {
            chunk_samples,
            hop_samples,
            buffer: Vec::with_capacity(chunk_samples * 2),
        }
    }

    /// Feed samples; returns every full window that became available.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.buffer.extend_from_slice(samples);

        let mut windows = Vec::new();
        while self.buffer.len() >= self.chunk_samples {
            windows.push(self.buffer[..self.chunk_samples].to_vec());
            self.buffer.drain(..self.hop_samples);
        }
        windows
    }

    /// Samples currently buffered (less than one full window).
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
