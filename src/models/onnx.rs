//! ONNX Runtime model backend

use crate::error::{InferenceError, LoadError};
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use crate::models::backend::ModelBackend;
use anyhow::Result;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Loaded ONNX regressor with metadata
pub struct OnnxModel {
    /// Source file
    path: PathBuf,
    /// Independent sessions over the same file (running needs exclusive access)
    sessions: Vec<Mutex<Session>>,
    /// Session to wait on when every session is busy
    next: AtomicUsize,
    /// Input name for the feature tensor
    pub input_name: String,
    /// Output name for the predicted score
    pub output_name: String,
}

impl OnnxModel {
    /// Take the first idle session, or wait for one in turn when all are busy.
    fn checkout(&self) -> Result<MutexGuard<'_, Session>, InferenceError> {
        for slot in &self.sessions {
            if let Ok(session) = slot.try_lock() {
                return Ok(session);
            }
        }

        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        self.sessions[index].lock().map_err(|_| {
            InferenceError::new(format!("{}: session lock poisoned", self.path.display()))
        })
    }
}

/// Backend running FIM regressors exported to ONNX
pub struct OnnxBackend {
    /// Number of threads for ONNX inference per session
    onnx_threads: usize,
    /// Sessions created per model file
    pool_size: usize,
}

impl OnnxBackend {
    /// Initialise ONNX Runtime and create a backend.
    ///
    /// `pool_size` sessions are built for every model so concurrent requests
    /// hitting the same model do not queue behind one session.
    pub fn new(onnx_threads: usize, pool_size: usize) -> Result<Self> {
        ort::init().commit()?;
        let pool_size = pool_size.max(1);
        info!(onnx_threads = onnx_threads, pool_size = pool_size, "ONNX Runtime initialized");
        Ok(Self {
            onnx_threads,
            pool_size,
        })
    }

    fn build_session(&self, path: &Path) -> ort::Result<Session> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
    }
}

impl ModelBackend for OnnxBackend {
    type Handle = OnnxModel;

    fn load_model(&self, path: &Path) -> Result<OnnxModel, LoadError> {
        if !path.exists() {
            return Err(LoadError::Missing(path.to_path_buf()));
        }

        debug!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let malformed = |e: ort::Error| LoadError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let session = self.build_session(path).map_err(malformed)?;

        let input = session.inputs.first().ok_or_else(|| LoadError::Malformed {
            path: path.to_path_buf(),
            reason: "model declares no inputs".to_string(),
        })?;

        // Dynamic dimensions are reported as -1 and cannot be checked here.
        if let Some(&width) = input.input_type.tensor_shape().and_then(|s| s.get(1)) {
            if width > 0 && width as usize != FEATURE_COUNT {
                return Err(LoadError::SchemaMismatch {
                    path: path.to_path_buf(),
                    expected: FEATURE_COUNT,
                    found: width as usize,
                });
            }
        }
        let input_name = input.name.clone();

        // Regressors exported from tree ensembles name their output "variable".
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("variable") || o.name.contains("output"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "variable".to_string());

        let mut sessions = Vec::with_capacity(self.pool_size);
        sessions.push(Mutex::new(session));
        for _ in 1..self.pool_size {
            sessions.push(Mutex::new(self.build_session(path).map_err(malformed)?));
        }

        info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            sessions = sessions.len(),
            "Model loaded successfully"
        );

        Ok(OnnxModel {
            path: path.to_path_buf(),
            sessions,
            next: AtomicUsize::new(0),
            input_name,
            output_name,
        })
    }

    fn invoke(&self, model: &OnnxModel, features: &FeatureVector) -> Result<f64, InferenceError> {
        let values = features.values();

        // Input tensor - shape [1, num_features]
        let shape = vec![1_i64, values.len() as i64];
        let input_tensor = Tensor::from_array((shape, values.to_vec()))
            .map_err(|e| InferenceError::new(format!("failed to create input tensor: {}", e)))?;

        let mut session = model.checkout()?;

        let outputs = session
            .run(ort::inputs![model.input_name.as_str() => input_tensor])
            .map_err(|e| InferenceError::new(format!("{}: {}", model.path.display(), e)))?;

        let output = outputs
            .get(model.output_name.as_str())
            .ok_or_else(|| InferenceError::new(format!("missing output {}", model.output_name)))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::new(format!("unexpected output type: {}", e)))?;

        data.first()
            .map(|&v| v as f64)
            .ok_or_else(|| InferenceError::new("empty output tensor"))
    }
}
