//! Output sinks for formatted emissions.
//!
//! Sinks are best-effort: a failing sink logs at debug level and the
//! emission is dropped for that sink only. Console display and WebSocket
//! broadcast are both sinks behind the same trait.

use crate::error::Result;
use crate::pipeline::station::{Station, StationError};
use crate::pipeline::types::Emission;
use crate::stats::SessionStats;
use log::debug;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

/// Pluggable emission handler.
pub trait RecordSink: Send + 'static {
    /// Handle one emission. Best-effort; errors are logged and dropped.
    fn broadcast(&mut self, emission: &Emission) -> Result<()>;

    /// Called on pipeline shutdown.
    fn finish(&mut self) {}

    /// Name for logging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Prints transcripts to stdout.
pub struct ConsoleSink {
    quiet: bool,
}

impl ConsoleSink {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl RecordSink for ConsoleSink {
    fn broadcast(&mut self, emission: &Emission) -> Result<()> {
        if !self.quiet {
            println!("TRANSCRIPT: {}", emission.display_text);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

/// Collects emissions for assertions in tests.
#[derive(Clone, Default)]
pub struct CollectorSink {
    emissions: Arc<Mutex<Vec<Emission>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.emissions
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.record.text.clone())
            .collect()
    }
}

impl RecordSink for CollectorSink {
    fn broadcast(&mut self, emission: &Emission) -> Result<()> {
        self.emissions.lock().unwrap().push(emission.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Terminal station fanning emissions out to every sink.
pub struct SinkStation {
    sinks: Vec<Box<dyn RecordSink>>,
    stats: Arc<SessionStats>,
}

impl SinkStation {
    pub fn new(sinks: Vec<Box<dyn RecordSink>>, stats: Arc<SessionStats>) -> Self {
        Self { sinks, stats }
    }
}

impl Station for SinkStation {
    type Input = Emission;
    type Output = ();

    fn name(&self) -> &'static str {
        "sink"
    }

    fn process(&mut self, emission: Emission) -> std::result::Result<Vec<()>, StationError> {
        for sink in &mut self.sinks {
            if let Err(e) = sink.broadcast(&emission) {
                debug!("sink={} broadcast failed: {}", sink.name(), e);
            }
        }
        self.stats.records_broadcast.fetch_add(1, Ordering::Relaxed);
        Ok(Vec::new())
    }

    fn shutdown(&mut self) {
        for sink in &mut self.sinks {
            sink.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LivesenseError;
    use crate::pipeline::types::{ConfidenceBucket, TranscriptionRecord};

    fn emission(text: &str) -> Emission {
        Emission {
            display_text: text.to_string(),
            record: TranscriptionRecord {
                kind: "transcription",
                text: text.to_string(),
                language: None,
                emotion: None,
                audio_events: vec![],
                has_itn: false,
                raw_text: text.to_string(),
                confidence: ConfidenceBucket::High,
                timestamp: "2025-01-01T00:00:00.000Z".to_string(),
                source: "livesense".to_string(),
            },
            new_words: vec![],
        }
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn broadcast(&mut self, _emission: &Emission) -> Result<()> {
            Err(LivesenseError::Broadcast {
                message: "down".to_string(),
            })
        }
    }

    #[test]
    fn test_collector_accumulates() {
        let collector = CollectorSink::new();
        let mut sink = collector.clone();
        sink.broadcast(&emission("one")).unwrap();
        sink.broadcast(&emission("two")).unwrap();
        assert_eq!(collector.texts(), vec!["one", "two"]);
    }

    #[test]
    fn test_station_fans_out_and_counts() {
        let collector_a = CollectorSink::new();
        let collector_b = CollectorSink::new();
        let stats = Arc::new(SessionStats::new());
        let mut station = SinkStation::new(
            vec![Box::new(collector_a.clone()), Box::new(collector_b.clone())],
            stats.clone(),
        );

        station.process(emission("hello")).unwrap();

        assert_eq!(collector_a.texts(), vec!["hello"]);
        assert_eq!(collector_b.texts(), vec!["hello"]);
        assert_eq!(stats.records_broadcast.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let collector = CollectorSink::new();
        let stats = Arc::new(SessionStats::new());
        let mut station = SinkStation::new(
            vec![Box::new(FailingSink), Box::new(collector.clone())],
            stats,
        );

        let result = station.process(emission("resilient"));
        assert!(result.is_ok());
        assert_eq!(collector.texts(), vec!["resilient"]);
    }
}
