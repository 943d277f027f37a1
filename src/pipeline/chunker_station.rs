//! Chunker station: device-rate frames in, model-rate windows out.

use crate::audio::chunker::{ChunkAssembler, Resampler};
use crate::pipeline::station::{Station, StationError};
use crate::pipeline::types::{AudioChunk, AudioFrame};
use log::debug;

/// Converts PCM frames to 16kHz and cuts overlapped windows. This is the
/// single owner of the model-rate ring buffer; window N always starts at
/// exactly `N * hop_ms` of session time.
pub struct ChunkerStation {
    resampler: Resampler,
    assembler: ChunkAssembler,
    hop_ms: f64,
    next_index: u64,
    last_sequence: Option<u64>,
}

impl ChunkerStation {
    pub fn new(device_rate: u32, chunk_samples: usize, hop_samples: usize, hop_ms: f64) -> Self {
        Self {
            resampler: Resampler::to_model_rate(device_rate),
            assembler: ChunkAssembler::new(chunk_samples, hop_samples),
            hop_ms,
            next_index: 0,
            last_sequence: None,
        }
    }
}

impl Station for ChunkerStation {
    type Input = AudioFrame;
    type Output = AudioChunk;

    fn name(&self) -> &'static str {
        "chunker"
    }

    fn process(&mut self, frame: AudioFrame) -> Result<Vec<AudioChunk>, StationError> {
        if frame.samples.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(last) = self.last_sequence
            && frame.sequence != last + 1
        {
            debug!(
                "capture sequence gap last={} now={}",
                last, frame.sequence
            );
        }
        self.last_sequence = Some(frame.sequence);

        let resampled = self.resampler.process(&frame.samples);
        let chunks = self
            .assembler
            .push(&resampled)
            .into_iter()
            .map(|samples| {
                let chunk = AudioChunk::new(samples, self.next_index, self.hop_ms);
                self.next_index += 1;
                chunk
            })
            .collect();
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_emits_windows_with_monotonic_offsets() {
        // 16 samples per window, hop 8, already at model rate.
        let mut station = ChunkerStation::new(16000, 16, 8, 1500.0);

        let mut chunks = Vec::new();
        for seq in 0..5 {
            let frame = AudioFrame::new(vec![100i16; 8], seq);
            chunks.extend(station.process(frame).unwrap());
        }

        // 40 samples → windows at 0, 8, 16 → 3 full windows (last needs 32).
        assert_eq!(chunks.len(), 4);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u64);
            assert_eq!(chunk.start_time_ms, i as f64 * 1500.0);
            assert_eq!(chunk.samples.len(), 16);
        }
    }

    #[test]
    fn test_chunker_resamples_to_model_rate() {
        // 48kHz device rate: 3 input samples per output sample.
        let mut station = ChunkerStation::new(48000, 10, 5, 1000.0);

        let frame = AudioFrame::new(vec![500i16; 60], 0);
        let chunks = station.process(frame).unwrap();
        // 60 device samples → 20 model samples → 3 windows of 10 (hop 5).
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_chunker_ignores_empty_frames() {
        let mut station = ChunkerStation::new(16000, 4, 2, 100.0);
        assert!(station.process(AudioFrame::new(vec![], 0)).unwrap().is_empty());
    }
}
