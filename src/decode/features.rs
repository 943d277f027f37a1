//! Encoder input preparation.
//!
//! The encoder consumes a `[1, T_total, D]` matrix whose first rows are
//! fixed task-query embeddings (language, event/emotion, text normalization)
//! and whose remaining rows are stacked log-mel acoustic features. Acoustic
//! rows are scaled down before inference; see `defaults::SPEECH_SCALE`.

use crate::decode::encoder::Tensor;
use crate::decode::metadata::Language;
use crate::defaults;
use crate::error::{LivesenseError, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::fs;
use std::path::Path;

/// Embedding row holding the auto-detect language query.
const AUTO_LANGUAGE_ROW: usize = 0;

/// Embedding rows holding the event/emotion query pair.
const EVENT_EMO_ROWS: [usize; 2] = [1, 2];

/// Embedding rows for the text-normalization query.
const WITH_ITN_ROW: usize = 14;
const WITHOUT_ITN_ROW: usize = 15;

/// Low-frame-rate stacking parameters.
const LFR_M: usize = 7;
const LFR_N: usize = 6;

/// Task-query embedding table loaded from a `.npy` file.
///
/// The file must contain a little-endian f32 matrix `[rows, dim]` in C
/// order; only that layout is accepted.
pub struct EmbeddingTable {
    data: Vec<f32>,
    rows: usize,
    dim: usize,
}

impl EmbeddingTable {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| LivesenseError::EmbeddingLoad {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::parse_npy(&bytes).map_err(|message| LivesenseError::EmbeddingLoad {
            message: format!("{}: {}", path.display(), message),
        })
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        if dim == 0 || rows.iter().any(|r| r.len() != dim) {
            return Err(LivesenseError::EmbeddingLoad {
                message: "embedding rows must be non-empty and uniform".to_string(),
            });
        }
        let count = rows.len();
        Ok(Self {
            data: rows.into_iter().flatten().collect(),
            rows: count,
            dim,
        })
    }

    fn parse_npy(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < 10 || &bytes[..6] != b"\x93NUMPY" {
            return Err("not a .npy file".to_string());
        }
        let major = bytes[6];
        let (header_len, header_start) = match major {
            1 => (
                u16::from_le_bytes([bytes[8], bytes[9]]) as usize,
                10usize,
            ),
            2 | 3 => {
                if bytes.len() < 12 {
                    return Err("truncated header".to_string());
                }
                (
                    u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                    12usize,
                )
            }
            other => return Err(format!("unsupported .npy version {}", other)),
        };
        let header_end = header_start + header_len;
        if bytes.len() < header_end {
            return Err("truncated header".to_string());
        }
        let header = std::str::from_utf8(&bytes[header_start..header_end])
            .map_err(|_| "header is not UTF-8".to_string())?;

        if !header.contains("'descr': '<f4'") {
            return Err("expected little-endian f32 ('<f4')".to_string());
        }
        if header.contains("'fortran_order': True") {
            return Err("Fortran order is not supported".to_string());
        }

        let shape_part = header
            .split("'shape':")
            .nth(1)
            .and_then(|s| s.split('(').nth(1))
            .and_then(|s| s.split(')').next())
            .ok_or_else(|| "missing shape".to_string())?;
        let dims: Vec<usize> = shape_part
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<usize>().map_err(|e| e.to_string()))
            .collect::<std::result::Result<_, _>>()?;
        if dims.len() != 2 {
            return Err(format!("expected 2-D embeddings, got shape {:?}", dims));
        }
        let (rows, dim) = (dims[0], dims[1]);

        let payload = &bytes[header_end..];
        if payload.len() != rows * dim * 4 {
            return Err(format!(
                "payload length {} does not match shape ({}, {})",
                payload.len(),
                rows,
                dim
            ));
        }
        let data: Vec<f32> = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self { data, rows, dim })
    }

    pub fn row(&self, index: usize) -> Result<&[f32]> {
        if index >= self.rows {
            return Err(LivesenseError::EmbeddingLoad {
                message: format!("embedding row {} out of range ({})", index, self.rows),
            });
        }
        Ok(&self.data[index * self.dim..(index + 1) * self.dim])
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Per-dimension shift/rescale statistics in Kaldi `am.mvn` text form.
pub struct CmvnStats {
    means: Vec<f32>,
    vars: Vec<f32>,
}

impl CmvnStats {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| LivesenseError::EmbeddingLoad {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::parse(&contents).ok_or_else(|| LivesenseError::EmbeddingLoad {
            message: format!("{}: malformed CMVN statistics", path.display()),
        })
    }

    fn parse(contents: &str) -> Option<Self> {
        let lines: Vec<&str> = contents.lines().collect();
        let mut means = None;
        let mut vars = None;

        for (i, line) in lines.iter().enumerate() {
            let first = line.split_whitespace().next().unwrap_or("");
            let target = match first {
                "<AddShift>" => &mut means,
                "<Rescale>" => &mut vars,
                _ => continue,
            };
            let next = lines.get(i + 1)?;
            let items: Vec<&str> = next.split_whitespace().collect();
            if items.first() != Some(&"<LearnRateCoef>") {
                continue;
            }
            // Values sit between the coefficient fields and the closing bracket.
            let values: Vec<f32> = items[3..items.len().saturating_sub(1)]
                .iter()
                .filter_map(|v| v.parse::<f32>().ok())
                .collect();
            *target = Some(values);
        }

        let (means, vars) = (means?, vars?);
        if means.is_empty() || means.len() != vars.len() {
            return None;
        }
        Some(Self { means, vars })
    }

    /// `(x + mean) * var` per dimension, tiled over frames.
    pub fn apply(&self, frames: &mut [Vec<f32>]) {
        for frame in frames {
            for (i, value) in frame.iter_mut().enumerate() {
                if let (Some(&m), Some(&v)) = (self.means.get(i), self.vars.get(i)) {
                    *value = (*value + m) * v;
                }
            }
        }
    }
}

/// Log-mel filterbank frontend (25ms frames, 10ms shift, Hamming window).
pub struct LogMelFrontend {
    sample_rate: u32,
    frame_len: usize,
    frame_shift: usize,
    fft_len: usize,
    window: Vec<f32>,
    filters: Vec<Vec<(usize, f32)>>,
    planner: FftPlanner<f32>,
}

impl LogMelFrontend {
    pub fn new(sample_rate: u32, mel_bins: usize) -> Self {
        let frame_len = (sample_rate as usize) * 25 / 1000;
        let frame_shift = (sample_rate as usize) * 10 / 1000;
        let fft_len = frame_len.next_power_of_two();

        let window = (0..frame_len)
            .map(|i| {
                0.54 - 0.46
                    * (2.0 * std::f32::consts::PI * i as f32 / (frame_len - 1) as f32).cos()
            })
            .collect();

        let filters = mel_filterbank(sample_rate, fft_len, mel_bins);

        Self {
            sample_rate,
            frame_len,
            frame_shift,
            fft_len,
            window,
            filters,
            planner: FftPlanner::new(),
        }
    }

    /// Extract `[T, mel_bins]` log-mel features from a normalized waveform.
    pub fn extract(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        if samples.len() < self.frame_len {
            return Vec::new();
        }

        let fft = self.planner.plan_fft_forward(self.fft_len);
        let frames = (samples.len() - self.frame_len) / self.frame_shift + 1;
        let mut features = Vec::with_capacity(frames);

        for f in 0..frames {
            let start = f * self.frame_shift;
            let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); self.fft_len];
            for i in 0..self.frame_len {
                // Match the training frontend: 16-bit-scaled waveform.
                buffer[i] = Complex::new(samples[start + i] * 32768.0 * self.window[i], 0.0);
            }
            fft.process(&mut buffer);

            let power: Vec<f32> = buffer[..self.fft_len / 2 + 1]
                .iter()
                .map(|c| c.norm_sqr())
                .collect();

            let row: Vec<f32> = self
                .filters
                .iter()
                .map(|filter| {
                    let energy: f32 = filter.iter().map(|&(bin, w)| power[bin] * w).sum();
                    energy.max(f32::MIN_POSITIVE).ln()
                })
                .collect();
            features.push(row);
        }

        features
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filters as sparse (bin, weight) lists.
fn mel_filterbank(sample_rate: u32, fft_len: usize, mel_bins: usize) -> Vec<Vec<(usize, f32)>> {
    let nyquist = sample_rate as f32 / 2.0;
    let mel_max = hz_to_mel(nyquist);
    let n_bins = fft_len / 2 + 1;

    let centers: Vec<f32> = (0..mel_bins + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (mel_bins + 1) as f32))
        .collect();

    let bin_freq = |bin: usize| bin as f32 * sample_rate as f32 / fft_len as f32;

    (0..mel_bins)
        .map(|m| {
            let (lo, center, hi) = (centers[m], centers[m + 1], centers[m + 2]);
            (0..n_bins)
                .filter_map(|bin| {
                    let f = bin_freq(bin);
                    if f <= lo || f >= hi {
                        return None;
                    }
                    let weight = if f <= center {
                        (f - lo) / (center - lo)
                    } else {
                        (hi - f) / (hi - center)
                    };
                    Some((bin, weight))
                })
                .collect()
        })
        .collect()
}

/// Low-frame-rate stacking: concatenate `m` consecutive frames every `n`.
fn apply_lfr(frames: &[Vec<f32>], m: usize, n: usize) -> Vec<Vec<f32>> {
    if frames.is_empty() {
        return Vec::new();
    }
    let dim = frames[0].len();
    let t = frames.len();
    let t_lfr = t.div_ceil(n);

    // Left-pad with copies of the first frame.
    let left_pad = (m - 1) / 2;
    let padded: Vec<&Vec<f32>> = std::iter::repeat_n(&frames[0], left_pad)
        .chain(frames.iter())
        .collect();

    (0..t_lfr)
        .map(|i| {
            let mut row = Vec::with_capacity(m * dim);
            for j in 0..m {
                let index = (i * n + j).min(padded.len() - 1);
                row.extend_from_slice(padded[index]);
            }
            row
        })
        .collect()
}

/// Prepared encoder input plus the query-row count the decoder must skip.
pub struct FeatureInput {
    pub tensor: Tensor,
    pub query_rows: usize,
}

/// Builds the `[1, T_total, D]` encoder input for one chunk.
pub struct FeatureBuilder {
    frontend: LogMelFrontend,
    embeddings: EmbeddingTable,
    cmvn: Option<CmvnStats>,
    use_itn: bool,
    input_len: usize,
}

impl FeatureBuilder {
    pub fn new(embeddings: EmbeddingTable, cmvn: Option<CmvnStats>, use_itn: bool) -> Result<Self> {
        let frontend = LogMelFrontend::new(defaults::MODEL_RATE, defaults::MEL_BINS);
        let expected_dim = defaults::MEL_BINS * LFR_M;
        if embeddings.dim() != expected_dim {
            return Err(LivesenseError::EmbeddingLoad {
                message: format!(
                    "embedding dim {} does not match feature dim {}",
                    embeddings.dim(),
                    expected_dim
                ),
            });
        }
        Ok(Self {
            frontend,
            embeddings,
            cmvn,
            use_itn,
            input_len: defaults::ENCODER_INPUT_LEN,
        })
    }

    /// Override the fixed encoder input length (tests).
    pub fn with_input_len(mut self, input_len: usize) -> Self {
        self.input_len = input_len;
        self
    }

    /// Build the input tensor for a 16kHz chunk conditioned on `language`
    /// (None selects the auto-detect query).
    pub fn build(&mut self, samples: &[f32], language: Option<Language>) -> Result<FeatureInput> {
        let mut acoustic = apply_lfr(&self.frontend.extract(samples), LFR_M, LFR_N);
        if let Some(cmvn) = &self.cmvn {
            cmvn.apply(&mut acoustic);
        }

        let dim = self.embeddings.dim();
        let language_row = language.map_or(AUTO_LANGUAGE_ROW, |l| l.embedding_row());
        let itn_row = if self.use_itn {
            WITH_ITN_ROW
        } else {
            WITHOUT_ITN_ROW
        };

        let mut rows: Vec<Vec<f32>> = Vec::with_capacity(self.input_len);
        rows.push(self.embeddings.row(language_row)?.to_vec());
        for &row in &EVENT_EMO_ROWS {
            rows.push(self.embeddings.row(row)?.to_vec());
        }
        rows.push(self.embeddings.row(itn_row)?.to_vec());
        let query_rows = rows.len();

        for frame in &acoustic {
            if rows.len() == self.input_len {
                break;
            }
            rows.push(frame.iter().map(|v| v * defaults::SPEECH_SCALE).collect());
        }
        while rows.len() < self.input_len {
            rows.push(vec![0.0; dim]);
        }

        let data: Vec<f32> = rows.into_iter().flatten().collect();
        let tensor = Tensor::from_data(data, [1, self.input_len, dim])?;
        Ok(FeatureInput { tensor, query_rows })
    }
}
