//! Application entry points for the CLI subcommands.

use crate::audio::capture::{CpalAudioSource, suppress_audio_warnings};
use crate::audio::source::{FramePhase, MockAudioSource};
use crate::config::Config;
use crate::decode::ctc::CtcDecoder;
use crate::decode::encoder::{EncoderClient, MockEncoderClient, Tensor};
use crate::decode::features::{CmvnStats, EmbeddingTable, FeatureBuilder};
use crate::decode::tokenizer::{Detokenizer, VocabDetokenizer};
use crate::defaults;
use crate::error::{LivesenseError, Result};
use crate::models;
use crate::pipeline::inference::InferenceStation;
use crate::pipeline::orchestrator::Pipeline;
use crate::pipeline::sink::{CollectorSink, ConsoleSink, RecordSink};
use crate::server::ws::WsServer;
use crate::stats::SessionStats;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run live transcription until interrupted.
pub async fn run_transcribe(config: Config) -> Result<()> {
    suppress_audio_warnings();

    let artifacts = resolve_artifacts(&config)?;

    let embeddings = EmbeddingTable::load(&artifacts.embedding)?;
    let cmvn = match &artifacts.cmvn {
        Some(path) => Some(CmvnStats::load(path)?),
        None => None,
    };
    let detokenizer = VocabDetokenizer::from_file(&artifacts.vocab)?;

    let mut encoder = load_encoder()?;
    encoder.load(&artifacts.model)?;
    info!("encoder loaded from {}", artifacts.model.display());

    let feature_builder = FeatureBuilder::new(embeddings, cmvn, config.use_itn)?;
    let decoder = CtcDecoder::new(Box::new(detokenizer));
    let stats = Arc::new(SessionStats::new());

    let inference = InferenceStation::new(&config, encoder, feature_builder, decoder, stats.clone());

    // WebSocket fan-out runs on the async runtime; the pipeline threads feed
    // it through the sink handle.
    let ws_server = WsServer::new(&config.websocket_host, config.websocket_port);
    let sinks: Vec<Box<dyn RecordSink>> =
        vec![Box::new(ConsoleSink::new(false)), Box::new(ws_server.sink())];
    let server_task = tokio::spawn(async move {
        if let Err(e) = ws_server.run().await {
            warn!("websocket server stopped: {}", e);
        }
    });

    let source = Box::new(CpalAudioSource::new(config.audio_device.as_deref())?);
    let pipeline = Pipeline::new(config, stats);
    let handle = pipeline.start(source, inference, sinks)?;

    info!("live transcription started, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| LivesenseError::Other(format!("Failed to wait for Ctrl+C: {}", e)))?;
    info!("shutting down");

    server_task.abort();
    handle.stop()
}

/// Download all model artifacts.
pub async fn run_download_models() -> Result<()> {
    let dir = models::download::download_all(true).await?;
    eprintln!("Artifacts installed in {}", dir.display());
    Ok(())
}

/// Resolved artifact paths for a session.
struct ArtifactPaths {
    model: PathBuf,
    embedding: PathBuf,
    vocab: PathBuf,
    cmvn: Option<PathBuf>,
}

/// Resolve artifact locations from configuration, falling back to the
/// installed catalog set.
fn resolve_artifacts(config: &Config) -> Result<ArtifactPaths> {
    fn resolve(explicit: &Option<PathBuf>, artifact: &str) -> Option<PathBuf> {
        explicit.clone().or_else(|| {
            models::catalog::get_artifact(artifact).map(|info| models::download::artifact_path(info))
        })
    }

    let model = resolve(&config.model_path, "encoder").ok_or_else(|| {
        LivesenseError::ConfigMissing {
            key: "MODEL_PATH".to_string(),
        }
    })?;
    if !model.exists() {
        return Err(LivesenseError::ModelNotFound {
            path: model.display().to_string(),
        });
    }

    let embedding = resolve(&config.embedding_path, "embedding").expect("embedding in catalog");
    let vocab = resolve(&config.bpe_path, "vocab").expect("vocab in catalog");
    let cmvn = resolve(&config.cmvn_path, "cmvn").filter(|p| p.exists());

    Ok(ArtifactPaths {
        model,
        embedding,
        vocab,
        cmvn,
    })
}

/// Obtain the accelerator client for this build.
///
/// The NPU runtime is a vendor component linked in by downstream builds via
/// the `EncoderClient` trait; a stock build has no backend and reports the
/// runtime as unavailable.
fn load_encoder() -> Result<Box<dyn EncoderClient>> {
    Err(LivesenseError::ModelNotFound {
        path: "no accelerator runtime in this build; \
               link an EncoderClient backend or run `livesense selftest`"
            .to_string(),
    })
}

/// Hardware-free smoke test of the full pipeline.
///
/// Drives the complete station graph with a scripted audio source and a
/// mock encoder, and checks the emitted transcript end to end.
pub async fn run_selftest() -> Result<()> {
    let config = Config::default();
    let stats = Arc::new(SessionStats::new());

    let vocab: Vec<String> = [
        "<blank>",
        "▁hello",
        "▁world",
        "<|en|>",
        "<|NEUTRAL|>",
        "<|withitn|>",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    // Encoder output: tags followed by "hello world" over the acoustic
    // frames, blanks elsewhere.
    let query_rows = 4;
    let frame_ids: &[u32] = &[3, 5, 4, 1, 1, 0, 0, 2, 2, 0, 0, 0];
    let mut output = Tensor::zeros([1, vocab.len(), query_rows + frame_ids.len()]);
    for t in 0..query_rows {
        *output.at_mut(0, 0, t) = 10.0;
    }
    for (f, &id) in frame_ids.iter().enumerate() {
        *output.at_mut(0, id as usize, query_rows + f) = 10.0;
    }

    let mut encoder = MockEncoderClient::new().with_outputs(vec![output]);
    encoder.load(std::path::Path::new("selftest"))?;

    let dim = defaults::MEL_BINS * 7;
    let embeddings = EmbeddingTable::from_rows((0..16).map(|r| vec![r as f32 * 0.01; dim]).collect())?;
    let feature_builder = FeatureBuilder::new(embeddings, None, true)?;
    let detokenizer = VocabDetokenizer::from_pieces(vocab);
    let expected = detokenizer.decode_ids(&[1, 2]);
    let decoder = CtcDecoder::new(Box::new(detokenizer));

    let inference =
        InferenceStation::new(&config, Box::new(encoder), feature_builder, decoder, stats.clone());

    // 3s of near-silence for calibration, then 3s of a 300Hz tone.
    let frame_len = 1600;
    let quiet = FramePhase {
        samples: vec![8i16; frame_len],
        count: 30,
    };
    let tone: Vec<i16> = (0..frame_len)
        .map(|i| {
            (10000.0 * (2.0 * std::f32::consts::PI * 300.0 * i as f32 / 16000.0).sin()) as i16
        })
        .collect();
    let speech = FramePhase {
        samples: tone,
        count: 30,
    };
    let source = Box::new(
        MockAudioSource::new()
            .with_sample_rate(defaults::MODEL_RATE)
            .with_frame_sequence(vec![quiet, speech]),
    );

    let collector = CollectorSink::new();
    let pipeline = Pipeline::new(config, stats);
    let handle = pipeline.start(source, inference, vec![Box::new(collector.clone())])?;

    // The scripted source exhausts itself; wait for wind-down.
    let deadline = Instant::now() + Duration::from_secs(15);
    while handle.is_running() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    handle.stop()?;

    let texts = collector.texts();
    if texts.iter().any(|t| t == &expected) {
        eprintln!("selftest OK: transcript {:?}", expected);
        Ok(())
    } else {
        Err(LivesenseError::Other(format!(
            "selftest failed: expected {:?}, got {:?}",
            expected, texts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_artifacts_requires_model() {
        let config = Config {
            model_path: Some(PathBuf::from("/nonexistent/encoder.rknn")),
            ..Default::default()
        };
        let result = resolve_artifacts(&config);
        assert!(matches!(result, Err(LivesenseError::ModelNotFound { .. })));
    }

    #[test]
    fn test_load_encoder_reports_missing_runtime() {
        let result = load_encoder();
        assert!(matches!(result, Err(LivesenseError::ModelNotFound { .. })));
    }

    #[tokio::test]
    async fn test_selftest_passes() {
        run_selftest().await.unwrap();
    }
}
