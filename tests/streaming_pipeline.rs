//! End-to-end pipeline tests over scripted audio and a mock encoder.

use livesense::audio::source::{FramePhase, MockAudioSource};
use livesense::config::Config;
use livesense::decode::ctc::CtcDecoder;
use livesense::decode::encoder::{EncoderClient, MockEncoderClient, Tensor};
use livesense::decode::features::{EmbeddingTable, FeatureBuilder};
use livesense::decode::tokenizer::VocabDetokenizer;
use livesense::defaults;
use livesense::pipeline::inference::InferenceStation;
use livesense::pipeline::orchestrator::Pipeline;
use livesense::pipeline::sink::CollectorSink;
use livesense::pipeline::station::Station;
use livesense::pipeline::types::{AudioChunk, ConfidenceBucket};
use livesense::stats::SessionStats;
use std::sync::Arc;
use std::time::{Duration, Instant};

const VOCAB: &[&str] = &[
    "<blank>",   // 0
    "▁hello",    // 1
    "▁how",      // 2
    "▁are",      // 3
    "▁you",      // 4
    "▁do",       // 5
    "▁doing",    // 6
    "▁today",    // 7
    "▁world",    // 8
    "<|en|>",    // 9
];

fn embeddings() -> EmbeddingTable {
    let dim = defaults::MEL_BINS * 7;
    EmbeddingTable::from_rows((0..16).map(|r| vec![r as f32 * 0.01; dim]).collect()).unwrap()
}

fn decoder() -> CtcDecoder {
    CtcDecoder::new(Box::new(VocabDetokenizer::from_pieces(
        VOCAB.iter().map(|s| s.to_string()).collect(),
    )))
}

/// Logit that softmaxes to roughly the requested posterior against a
/// zero-filled vocabulary row.
fn logit_for(posterior: f32, vocab_size: usize) -> f32 {
    (posterior / (1.0 - posterior) * (vocab_size - 1) as f32).ln()
}

/// Encoder output where acoustic frame `f` decodes to `frames[f].0` with
/// confidence near `frames[f].1`. Id 0 is blank.
fn scripted_output(frames: &[(u32, f32)], query_rows: usize) -> Tensor {
    let t_total = query_rows + frames.len();
    let mut tensor = Tensor::zeros([1, VOCAB.len(), t_total]);
    for t in 0..query_rows {
        *tensor.at_mut(0, 0, t) = 10.0;
    }
    for (f, &(id, conf)) in frames.iter().enumerate() {
        *tensor.at_mut(0, id as usize, query_rows + f) = logit_for(conf, VOCAB.len());
    }
    tensor
}

fn station_with_outputs(config: &Config, outputs: Vec<Tensor>) -> InferenceStation {
    let mut encoder = MockEncoderClient::new().with_outputs(outputs);
    encoder.load(std::path::Path::new("/dev/null")).unwrap();
    let builder = FeatureBuilder::new(embeddings(), None, true).unwrap();
    InferenceStation::new(
        config,
        Box::new(encoder),
        builder,
        decoder(),
        Arc::new(SessionStats::new()),
    )
}

/// Distinct tonal chunk loud enough for VAD.
fn speech_chunk(index: u64, freq: f32) -> AudioChunk {
    let samples: Vec<f32> = (0..48000)
        .map(|i| 0.3 * (2.0 * std::f32::consts::PI * freq * i as f32 / 16000.0).sin())
        .collect();
    AudioChunk::new(samples, index, 1500.0)
}

fn calibrate(station: &mut InferenceStation) {
    let quiet = AudioChunk::new(vec![0.0005; 48000], 0, 1500.0);
    assert!(station.process(quiet).unwrap().is_empty());
}

#[test]
fn s1_hello_world_single_chunk() {
    // One confident chunk decoding "<|en|> hello world"; nothing afterwards.
    let chunk0 = scripted_output(
        &[
            (9, 0.95),
            (1, 0.95),
            (1, 0.95),
            (0, 0.95),
            (8, 0.95),
            (8, 0.95),
            (0, 0.95),
            (0, 0.95),
        ],
        4,
    );
    // Second chunk decodes pure blank.
    let silent = scripted_output(&[(0, 0.99); 8], 4);

    let mut station = station_with_outputs(&Config::default(), vec![chunk0, silent]);
    calibrate(&mut station);

    let first = station.process(speech_chunk(1, 200.0)).unwrap();
    assert_eq!(first.len(), 1);
    let emission = &first[0];
    assert_eq!(emission.record.text, "hello world");
    assert_eq!(emission.record.language.as_deref(), Some("English"));
    assert_eq!(emission.record.confidence, ConfidenceBucket::High);
    assert!(emission.display_text.contains("[English]"));

    let second = station.process(speech_chunk(2, 250.0)).unwrap();
    assert!(second.is_empty(), "no second chunk may emit new words");
}

#[test]
fn s2_two_sentences_across_chunk_boundary() {
    // Chunk 0: "hello how are you do" with a weak trailing "do".
    // 10 acoustic frames over 3000ms → 300ms per frame.
    let chunk0 = scripted_output(
        &[
            (1, 0.9),  // hello 0-300
            (0, 0.9),
            (2, 0.9),  // how 600-900
            (0, 0.9),
            (3, 0.9),  // are 1200-1500
            (0, 0.9),
            (4, 0.9),  // you 1800-2100
            (0, 0.9),
            (5, 0.35), // do 2400 (below timeline admission)
            (0, 0.9),
        ],
        4,
    );
    // Chunk 1 (offset 1500ms): re-decodes the boundary then continues.
    let chunk1 = scripted_output(
        &[
            (3, 0.9), // are → global 1500, already covered
            (4, 0.9), // you → global 1800-2100, already covered
            (0, 0.9),
            (0, 0.9),
            (6, 0.9), // doing 1200-1500 → global 2700-3000
            (6, 0.9),
            (7, 0.9), // today 1800-2100 → global 3300-3600
            (7, 0.9),
            (0, 0.9),
            (0, 0.9),
        ],
        4,
    );

    let mut station = station_with_outputs(&Config::default(), vec![chunk0, chunk1]);
    calibrate(&mut station);

    let first = station.process(speech_chunk(1, 200.0)).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].record.text, "hello how are you");

    let second = station.process(speech_chunk(2, 250.0)).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].record.text, "doing today");
}

#[test]
fn emissions_are_monotonic_in_global_time() {
    let outputs = vec![
        scripted_output(
            &[(1, 0.9), (1, 0.9), (0, 0.9), (2, 0.9), (2, 0.9), (0, 0.9)],
            4,
        ),
        scripted_output(
            &[(3, 0.9), (3, 0.9), (0, 0.9), (4, 0.9), (4, 0.9), (0, 0.9)],
            4,
        ),
        scripted_output(
            &[(6, 0.9), (6, 0.9), (0, 0.9), (7, 0.9), (7, 0.9), (0, 0.9)],
            4,
        ),
    ];
    let mut station = station_with_outputs(&Config::default(), outputs);
    calibrate(&mut station);

    let mut words = Vec::new();
    for (i, freq) in [(1u64, 200.0), (2, 250.0), (3, 320.0)] {
        for emission in station.process(speech_chunk(i, freq)).unwrap() {
            words.extend(emission.new_words);
        }
    }

    assert!(!words.is_empty());
    for pair in words.windows(2) {
        assert!(
            pair[1].start_ms >= pair[0].start_ms,
            "emitted words out of order: {:?}",
            words
        );
    }
}

#[test]
fn full_pipeline_transcribes_scripted_audio() {
    let config = Config::default();
    let stats = Arc::new(SessionStats::new());

    let output = scripted_output(
        &[
            (9, 0.95),
            (1, 0.95),
            (1, 0.95),
            (0, 0.95),
            (8, 0.95),
            (8, 0.95),
            (0, 0.95),
            (0, 0.95),
        ],
        4,
    );
    let mut encoder = MockEncoderClient::new().with_outputs(vec![output]);
    encoder.load(std::path::Path::new("/dev/null")).unwrap();
    let builder = FeatureBuilder::new(embeddings(), None, true).unwrap();
    let inference = InferenceStation::new(
        &config,
        Box::new(encoder),
        builder,
        decoder(),
        stats.clone(),
    );

    // 3s near-silence for calibration, then 3s of tone.
    let tone: Vec<i16> = (0..1600)
        .map(|i| (9000.0 * (2.0 * std::f32::consts::PI * 300.0 * i as f32 / 16000.0).sin()) as i16)
        .collect();
    let source = Box::new(
        MockAudioSource::new()
            .with_sample_rate(defaults::MODEL_RATE)
            .with_frame_sequence(vec![
                FramePhase {
                    samples: vec![8i16; 1600],
                    count: 30,
                },
                FramePhase {
                    samples: tone,
                    count: 30,
                },
            ]),
    );

    let collector = CollectorSink::new();
    let pipeline = Pipeline::new(config, stats);
    let handle = pipeline
        .start(source, inference, vec![Box::new(collector.clone())])
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(15);
    while handle.is_running() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    handle.stop().unwrap();

    let texts = collector.texts();
    assert!(
        texts.iter().any(|t| t == "hello world"),
        "expected a hello world emission, got {:?}",
        texts
    );
    // The overlapping re-decode of the same audio must not re-emit.
    assert_eq!(
        texts.iter().filter(|t| t.as_str() == "hello world").count(),
        1
    );
}
