use crate::defaults;
use crate::error::{LivesenseError, Result};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
/// Sources deliver 16-bit PCM mono frames at the device rate reported by
/// `sample_rate()`.
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read the next frame of PCM samples.
    ///
    /// Blocks until samples are available. An empty frame signals that the
    /// source is exhausted (mock sources and file playback); real devices
    /// block until data is ready or fail with `AudioCapture`.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Device sample rate in Hz.
    fn sample_rate(&self) -> u32;
}

/// One phase of a scripted mock capture: `count` frames of `samples`.
#[derive(Debug, Clone)]
pub struct FramePhase {
    pub samples: Vec<i16>,
    pub count: usize,
}

/// Mock audio source for testing.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    phases: Vec<FramePhase>,
    phase_index: usize,
    frame_in_phase: usize,
    sample_rate: u32,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source that yields silence forever.
    pub fn new() -> Self {
        Self {
            is_started: false,
            phases: vec![FramePhase {
                samples: vec![0i16; 160],
                count: usize::MAX,
            }],
            phase_index: 0,
            frame_in_phase: 0,
            sample_rate: defaults::MODEL_RATE,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Script the frames this source produces; the source is exhausted after
    /// the last phase.
    pub fn with_frame_sequence(mut self, phases: Vec<FramePhase>) -> Self {
        self.phases = phases;
        self.phase_index = 0;
        self.frame_in_phase = 0;
        self
    }

    /// Report a different device rate.
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read.
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started.
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(LivesenseError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(LivesenseError::AudioCapture {
                message: self.error_message.clone(),
            });
        }

        while let Some(phase) = self.phases.get(self.phase_index) {
            if self.frame_in_phase < phase.count {
                self.frame_in_phase += 1;
                return Ok(phase.samples.clone());
            }
            self.phase_index += 1;
            self.frame_in_phase = 0;
        }

        // Exhausted
        Ok(Vec::new())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_yields_scripted_frames() {
        let mut source = MockAudioSource::new().with_frame_sequence(vec![
            FramePhase {
                samples: vec![100i16; 160],
                count: 2,
            },
            FramePhase {
                samples: vec![-5i16; 80],
                count: 1,
            },
        ]);

        assert_eq!(source.read_samples().unwrap(), vec![100i16; 160]);
        assert_eq!(source.read_samples().unwrap(), vec![100i16; 160]);
        assert_eq!(source.read_samples().unwrap(), vec![-5i16; 80]);
        assert!(source.read_samples().unwrap().is_empty());
        // Stays exhausted
        assert!(source.read_samples().unwrap().is_empty());
    }

    #[test]
    fn test_mock_source_start_stop_state() {
        let mut source = MockAudioSource::new();
        assert!(!source.is_started());
        source.start().unwrap();
        assert!(source.is_started());
        source.stop().unwrap();
        assert!(!source.is_started());
    }

    #[test]
    fn test_mock_source_start_failure() {
        let mut source = MockAudioSource::new()
            .with_start_failure()
            .with_error_message("device not found");

        let result = source.start();
        assert!(!source.is_started());
        match result {
            Err(LivesenseError::AudioCapture { message }) => {
                assert_eq!(message, "device not found");
            }
            _ => panic!("Expected AudioCapture error"),
        }
    }

    #[test]
    fn test_mock_source_read_failure() {
        let mut source = MockAudioSource::new().with_read_failure();
        assert!(source.read_samples().is_err());
    }

    #[test]
    fn test_mock_source_custom_rate() {
        let source = MockAudioSource::new().with_sample_rate(48000);
        assert_eq!(source.sample_rate(), 48000);
    }

    #[test]
    fn test_source_trait_is_object_safe() {
        let mut source: Box<dyn AudioSource> =
            Box::new(MockAudioSource::new().with_frame_sequence(vec![FramePhase {
                samples: vec![1i16, 2, 3],
                count: 1,
            }]));

        source.start().unwrap();
        assert_eq!(source.read_samples().unwrap(), vec![1i16, 2, 3]);
        source.stop().unwrap();
    }
}
