//! Station abstraction for pipeline stages.
//!
//! Each station runs in its own thread, pulling from a bounded input
//! channel and pushing to a bounded output channel. Back-pressure flows
//! upstream through blocking sends; shutdown drains each stage for a
//! bounded time.

use crate::defaults;
use log::{error, warn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Errors that can occur during station processing.
#[derive(Debug, Clone)]
pub enum StationError {
    /// Recoverable error that allows the station to continue processing.
    Recoverable(String),
    /// Fatal error that requires the session to shut down.
    Fatal(String),
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StationError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Trait for reporting station errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a station.
    fn report(&self, station: &str, error: &StationError);
}

/// Error reporter that logs through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, error: &StationError) {
        match error {
            StationError::Recoverable(_) => warn!("station={} {}", station, error),
            StationError::Fatal(_) => error!("station={} {}", station, error),
        }
    }
}

/// Reporter that additionally halts the session on fatal errors.
pub struct HaltingReporter {
    running: Arc<AtomicBool>,
    inner: LogReporter,
}

impl HaltingReporter {
    pub fn new(running: Arc<AtomicBool>) -> Self {
        Self {
            running,
            inner: LogReporter,
        }
    }
}

impl ErrorReporter for HaltingReporter {
    fn report(&self, station: &str, error: &StationError) {
        self.inner.report(station, error);
        if matches!(error, StationError::Fatal(_)) {
            self.running.store(false, Ordering::SeqCst);
        }
    }
}

/// One pipeline stage.
pub trait Station: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    /// Process one input into zero or more outputs.
    fn process(&mut self, input: Self::Input) -> Result<Vec<Self::Output>, StationError>;

    /// Called once after the input channel closes or the session stops.
    fn shutdown(&mut self) {}
}

/// Runs a station on its own thread.
pub struct StationRunner {
    handle: JoinHandle<()>,
}

impl StationRunner {
    /// Spawn the station loop.
    ///
    /// The loop exits when the session stops (after draining for at most
    /// the shutdown budget), the input disconnects, or the station reports
    /// a fatal error.
    pub fn spawn<S: Station>(
        mut station: S,
        input: crossbeam_channel::Receiver<S::Input>,
        output: crossbeam_channel::Sender<S::Output>,
        running: Arc<AtomicBool>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let handle = thread::spawn(move || {
            let mut drain_deadline: Option<Instant> = None;

            loop {
                if drain_deadline.is_none() && !running.load(Ordering::SeqCst) {
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

                let item = match input.recv_timeout(timeout) {
                    Ok(item) => item,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                        // While draining, an empty input means we're done.
                        if drain_deadline.is_some() && input.is_empty() {
                            break;
                        }
                        continue;
                    }
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                };

                match station.process(item) {
                    Ok(outputs) => {
                        for out in outputs {
                            if output.send(out).is_err() {
                                // Downstream gone; nothing left to do.
                                station.shutdown();
                                return;
                            }
                        }
                    }
                    Err(err @ StationError::Recoverable(_)) => {
                        reporter.report(station.name(), &err);
                    }
                    Err(err @ StationError::Fatal(_)) => {
                        reporter.report(station.name(), &err);
                        break;
                    }
                }
            }

            station.shutdown();
        });

        Self { handle }
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}
