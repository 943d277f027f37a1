//! Real audio capture using CPAL (Cross-Platform Audio Library).

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{LivesenseError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing to
/// users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2
/// (stderr). Safe as long as no other thread is concurrently manipulating
/// fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA messages that occur during audio backend probing.
///
/// # Safety
/// Modifies environment variables; safe when called before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device name fragments when no explicit device is configured.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// List all available audio input device names.
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| LivesenseError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Find an input device by case-insensitive substring match, falling back
/// to the preferred-device list and then the system default.
fn select_device(preference: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(wanted) = preference
            && !wanted.eq_ignore_ascii_case("default")
        {
            let wanted_lower = wanted.to_lowercase();
            let devices = host
                .input_devices()
                .map_err(|e| LivesenseError::AudioCapture {
                    message: format!("Failed to enumerate input devices: {}", e),
                })?;
            for device in devices {
                if let Ok(name) = device.name()
                    && name.to_lowercase().contains(&wanted_lower)
                {
                    return Ok(device);
                }
            }
            return Err(LivesenseError::AudioDeviceNotFound {
                device: wanted.to_string(),
            });
        }

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    let lower = name.to_lowercase();
                    if PREFERRED_DEVICES
                        .iter()
                        .any(|pref| lower.contains(&pref.to_lowercase()))
                    {
                        return Ok(device);
                    }
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| LivesenseError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Probe the fixed rate set in preference order and return the first rate
/// the device supports, together with the channel count to open.
fn probe_sample_rate(device: &cpal::Device) -> Result<(u32, u16)> {
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let configs: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| LivesenseError::AudioCapture {
            message: format!("Failed to query configs for {}: {}", device_name, e),
        })?
        .collect();

    for &rate in defaults::PROBE_RATES {
        for config in &configs {
            if config.min_sample_rate().0 <= rate && rate <= config.max_sample_rate().0 {
                debug!("device={} rate={}Hz supported", device_name, rate);
                return Ok((rate, config.channels()));
            }
        }
    }

    Err(LivesenseError::UnsupportedRate {
        device: device_name,
    })
}

/// Shared state between the cpal callback and `read_samples`.
struct CaptureShared {
    buffer: Mutex<Vec<i16>>,
    available: Condvar,
    closed: AtomicBool,
    error: Mutex<Option<String>>,
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is only accessed from a single thread at a time; its
/// methods are called synchronously and never cross thread boundaries.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Real audio capture implementation using CPAL.
///
/// Captures 16-bit PCM mono at whichever probed rate the device supports,
/// mixing multi-channel input down to mono in the callback. The capture
/// callback only moves samples into the shared buffer; all downstream work
/// happens on consumer threads.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Option<SendableStream>,
    shared: Arc<CaptureShared>,
    sample_rate: u32,
    channels: u16,
}

impl CpalAudioSource {
    /// Create a new CPAL audio source.
    ///
    /// # Arguments
    /// * `device_name` - Optional device substring. If None, uses the
    ///   preferred-device list and then the default input device.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = select_device(device_name)?;
        let (sample_rate, channels) = probe_sample_rate(&device)?;

        info!(
            "audio device={} rate={}Hz channels={}",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate,
            channels
        );

        Ok(Self {
            device,
            stream: None,
            shared: Arc::new(CaptureShared {
                buffer: Mutex::new(Vec::new()),
                available: Condvar::new(),
                closed: AtomicBool::new(false),
                error: Mutex::new(None),
            }),
            sample_rate,
            channels,
        })
    }

    fn push_mono(shared: &CaptureShared, mono: impl Iterator<Item = i16>) {
        let mut buffer = shared.buffer.lock().unwrap();
        buffer.extend(mono);
        shared.available.notify_one();
    }

    fn mark_failed(shared: &CaptureShared, message: String) {
        warn!("capture stream error: {}", message);
        *shared.error.lock().unwrap() = Some(message);
        shared.closed.store(true, Ordering::SeqCst);
        shared.available.notify_all();
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let channels = usize::from(self.channels);
        let data_shared = self.shared.clone();
        let err_shared = self.shared.clone();

        let stream = self
            .device
            .build_input_stream(
                &config,
                move |data: &[f32], _| {
                    // Downmix interleaved channels to mono i16.
                    let mono = data.chunks(channels).map(|frame| {
                        let sum: f32 = frame.iter().sum();
                        let avg = sum / frame.len() as f32;
                        (avg.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                    });
                    Self::push_mono(&data_shared, mono);
                },
                move |err| {
                    Self::mark_failed(&err_shared, err.to_string());
                },
                None,
            )
            .map_err(|e| LivesenseError::AudioCapture {
                message: format!("Failed to build input stream: {}", e),
            })?;

        stream.play().map_err(|e| LivesenseError::AudioCapture {
            message: format!("Failed to start input stream: {}", e),
        })?;

        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.available.notify_all();
        self.stream = None;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let mut buffer = self.shared.buffer.lock().unwrap();
        loop {
            if !buffer.is_empty() {
                return Ok(std::mem::take(&mut *buffer));
            }
            if self.shared.closed.load(Ordering::SeqCst) {
                let error = self.shared.error.lock().unwrap().take();
                return match error {
                    Some(message) => Err(LivesenseError::AudioCapture { message }),
                    // Graceful stop: report exhaustion.
                    None => Ok(Vec::new()),
                };
            }
            let (guard, _timeout) = self
                .shared
                .available
                .wait_timeout(buffer, Duration::from_millis(100))
                .unwrap();
            buffer = guard;
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
