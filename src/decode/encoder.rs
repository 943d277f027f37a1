//! Opaque encoder interface.
//!
//! The neural runtime is an external collaborator; the pipeline only needs
//! `load` and `infer` with declared tensor shapes. Callers guarantee
//! single-threaded invocation per instance.

use crate::error::{LivesenseError, Result};
use std::path::Path;

/// Dense row-major f32 tensor with a three-axis shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub data: Vec<f32>,
    pub shape: [usize; 3],
}

impl Tensor {
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self {
            data: vec![0.0; shape[0] * shape[1] * shape[2]],
            shape,
        }
    }

    pub fn from_data(data: Vec<f32>, shape: [usize; 3]) -> Result<Self> {
        if data.len() != shape[0] * shape[1] * shape[2] {
            return Err(LivesenseError::Decode {
                message: format!(
                    "tensor data length {} does not match shape {:?}",
                    data.len(),
                    shape
                ),
            });
        }
        Ok(Self { data, shape })
    }

    #[inline]
    pub fn at(&self, i: usize, j: usize, k: usize) -> f32 {
        self.data[(i * self.shape[1] + j) * self.shape[2] + k]
    }

    #[inline]
    pub fn at_mut(&mut self, i: usize, j: usize, k: usize) -> &mut f32 {
        &mut self.data[(i * self.shape[1] + j) * self.shape[2] + k]
    }
}

/// Contract with the accelerator runtime.
///
/// `infer` maps a `[1, T_total, D]` feature tensor to `[1, V, T_total]`
/// logits. Inference errors are non-fatal per chunk; the orchestrator
/// escalates only on sustained failure.
pub trait EncoderClient: Send {
    /// Load the model file and initialize the runtime.
    fn load(&mut self, model_path: &Path) -> Result<()>;

    /// Run one synchronous inference call.
    fn infer(&mut self, input: &Tensor) -> Result<Tensor>;

    /// Whether `load` has succeeded.
    fn is_ready(&self) -> bool;
}

/// Mock encoder returning scripted outputs, for tests and `selftest`.
pub struct MockEncoderClient {
    outputs: Vec<Tensor>,
    next: usize,
    ready: bool,
    fail_load: bool,
    fail_infer: bool,
    pub infer_calls: usize,
}

impl MockEncoderClient {
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            next: 0,
            ready: false,
            fail_load: false,
            fail_infer: false,
            infer_calls: 0,
        }
    }

    /// Queue outputs returned by successive `infer` calls; the last output
    /// repeats once the queue is exhausted.
    pub fn with_outputs(mut self, outputs: Vec<Tensor>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_load_failure(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn with_infer_failure(mut self) -> Self {
        self.fail_infer = true;
        self
    }
}

impl Default for MockEncoderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderClient for MockEncoderClient {
    fn load(&mut self, model_path: &Path) -> Result<()> {
        if self.fail_load {
            return Err(LivesenseError::ModelLoad {
                message: format!("mock load failure for {}", model_path.display()),
            });
        }
        self.ready = true;
        Ok(())
    }

    fn infer(&mut self, _input: &Tensor) -> Result<Tensor> {
        self.infer_calls += 1;
        if self.fail_infer {
            return Err(LivesenseError::Inference {
                message: "mock inference failure".to_string(),
            });
        }
        if self.outputs.is_empty() {
            return Err(LivesenseError::Inference {
                message: "mock encoder has no scripted outputs".to_string(),
            });
        }
        let index = self.next.min(self.outputs.len() - 1);
        self.next += 1;
        Ok(self.outputs[index].clone())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
