//! Pipeline wiring and lifecycle.
//!
//! Thread layout: capture → chunker → inference → sink, connected by
//! bounded crossbeam channels. The capture thread blocks on the frame
//! channel (back-pressure); the chunker is the only stage allowed to drop
//! under saturation. Shutdown flips the running flag, each stage drains
//! within its budget, and the handle surfaces any fatal error.

use crate::audio::source::AudioSource;
use crate::config::Config;
use crate::defaults;
use crate::error::{LivesenseError, Result};
use crate::pipeline::chunker_station::ChunkerStation;
use crate::pipeline::inference::InferenceStation;
use crate::pipeline::sink::{RecordSink, SinkStation};
use crate::pipeline::station::{
    ErrorReporter, HaltingReporter, Station, StationError, StationRunner,
};
use crate::pipeline::types::AudioFrame;
use crate::stats::SessionStats;
use crossbeam_channel::bounded;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shared slot for the error that brought the session down.
type FatalSlot = Arc<Mutex<Option<LivesenseError>>>;

/// Handle to a running transcription session.
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    fatal: FatalSlot,
    stats: Arc<SessionStats>,
}

impl PipelineHandle {
    /// Stop the session, join all stages, and surface any fatal error.
    pub fn stop(mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);

        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }

        match self.fatal.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

/// Builds and launches the session threads.
pub struct Pipeline {
    config: Config,
    stats: Arc<SessionStats>,
}

impl Pipeline {
    pub fn new(config: Config, stats: Arc<SessionStats>) -> Self {
        Self { config, stats }
    }

    /// Start capture and all pipeline stages.
    ///
    /// # Arguments
    /// * `audio_source` - PCM source at its reported device rate
    /// * `inference` - fully constructed inference station
    /// * `sinks` - emission handlers (console, WebSocket, collectors)
    pub fn start(
        self,
        mut audio_source: Box<dyn AudioSource>,
        inference: InferenceStation,
        sinks: Vec<Box<dyn RecordSink>>,
    ) -> Result<PipelineHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let fatal: FatalSlot = Arc::new(Mutex::new(None));
        let sequence = Arc::new(AtomicU64::new(0));

        let (frame_tx, frame_rx) = bounded::<AudioFrame>(defaults::FRAME_BUFFER);
        let (chunk_tx, chunk_rx) = bounded(defaults::CHUNK_BUFFER);
        let (emission_tx, emission_rx) = bounded(defaults::RECORD_BUFFER);

        let device_rate = audio_source.sample_rate();
        let chunker = ChunkerStation::new(
            device_rate,
            self.config.chunk_samples(),
            self.config.hop_samples(),
            self.config.hop_ms(),
        );
        info!(
            "pipeline start device_rate={}Hz chunk={:.1}s hop={:.1}s",
            device_rate,
            self.config.chunk_duration_s,
            self.config.hop_s()
        );

        audio_source.start()?;

        // Capture thread: the only code touching the audio source. Blocks
        // on the frame channel so back-pressure reaches the device buffer.
        let capture_running = running.clone();
        let capture_fatal = fatal.clone();
        let capture_handle = thread::spawn(move || {
            while capture_running.load(Ordering::SeqCst) {
                let samples = match audio_source.read_samples() {
                    Ok(samples) => samples,
                    Err(e) => {
                        *capture_fatal.lock().unwrap() = Some(e);
                        capture_running.store(false, Ordering::SeqCst);
                        break;
                    }
                };

                // Source exhausted: wind the session down gracefully.
                if samples.is_empty() {
                    capture_running.store(false, Ordering::SeqCst);
                    break;
                }

                let frame = AudioFrame::new(samples, sequence.fetch_add(1, Ordering::Relaxed));
                if frame_tx.send(frame).is_err() {
                    break;
                }
            }
            let _ = audio_source.stop();
        });

        // Chunker thread: the one stage permitted to drop under queue
        // saturation.
        let chunker_running = running.clone();
        let chunker_handle = thread::spawn(move || {
            let mut station = chunker;
            let mut drain_deadline: Option<Instant> = None;

            loop {
                if drain_deadline.is_none() && !chunker_running.load(Ordering::SeqCst) {
                    drain_deadline =
                        Some(Instant::now() + Duration::from_secs(defaults::DRAIN_TIMEOUT_S));
                }
                let timeout = match drain_deadline {
                    Some(deadline) => {
                        let Some(remaining) = deadline.checked_duration_since(Instant::now())
                        else {
                            break;
                        };
                        remaining.min(Duration::from_millis(100))
                    }
                    None => Duration::from_millis(100),
                };

                let frame = match frame_rx.recv_timeout(timeout) {
                    Ok(frame) => frame,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        if drain_deadline.is_some() && frame_rx.is_empty() {
                            break;
                        }
                        continue;
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                };

                if let Ok(chunks) = station.process(frame) {
                    for chunk in chunks {
                        if chunk_tx.try_send(chunk).is_err() {
                            warn!("chunk queue saturated, dropping window");
                        }
                    }
                }
            }
        });

        let reporter: Arc<dyn ErrorReporter> = Arc::new(HaltingReporter::new(running.clone()));

        // Fatal inference errors land in the shared slot via a wrapper.
        let inference_reporter = Arc::new(SlotReporter {
            inner: reporter.clone(),
            fatal: fatal.clone(),
        });
        let inference_runner = StationRunner::spawn(
            inference,
            chunk_rx,
            emission_tx,
            running.clone(),
            inference_reporter,
        );

        let sink_station = SinkStation::new(sinks, self.stats.clone());
        let (sink_out_tx, _sink_out_rx) = bounded::<()>(1);
        let sink_runner = StationRunner::spawn(
            sink_station,
            emission_rx,
            sink_out_tx,
            running.clone(),
            reporter,
        );

        let mut threads = vec![capture_handle, chunker_handle];
        threads.push(thread::spawn(move || {
            let _ = inference_runner.join();
        }));
        threads.push(thread::spawn(move || {
            let _ = sink_runner.join();
        }));

        Ok(PipelineHandle {
            running,
            threads,
            fatal,
            stats: self.stats,
        })
    }
}

/// Reporter wrapper that captures the fatal error for the handle.
struct SlotReporter {
    inner: Arc<dyn ErrorReporter>,
    fatal: FatalSlot,
}

impl ErrorReporter for SlotReporter {
    fn report(&self, station: &str, error: &StationError) {
        if let StationError::Fatal(message) = error {
            let mut slot = self.fatal.lock().unwrap();
            if slot.is_none() {
                *slot = Some(LivesenseError::Inference {
                    message: message.clone(),
                });
            }
        }
        self.inner.report(station, error);
    }
}
