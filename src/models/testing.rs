//! In-memory backend for tests.

use crate::error::{InferenceError, LoadError};
use crate::feature_extractor::FeatureVector;
use crate::models::backend::ModelBackend;
use crate::models::id::ModelId;
use crate::models::registry::ModelRegistry;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub enum MockModel {
    /// Always predicts the same value
    Constant(f64),
    /// Predicts the value of one feature column
    Echo(&'static str),
    /// Loads but fails every invocation
    Failing,
    /// Fails to load
    Corrupt,
}

/// Backend serving canned models keyed by file name.
#[derive(Default)]
pub struct MockBackend {
    files: HashMap<String, MockModel>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file_name: &str, model: MockModel) -> Self {
        self.files.insert(file_name.to_string(), model);
        self
    }
}

impl ModelBackend for MockBackend {
    type Handle = MockModel;

    fn load_model(&self, path: &Path) -> Result<MockModel, LoadError> {
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or_default();

        match self.files.get(file_name) {
            None => Err(LoadError::Missing(path.to_path_buf())),
            Some(MockModel::Corrupt) => Err(LoadError::Malformed {
                path: path.to_path_buf(),
                reason: "corrupt".to_string(),
            }),
            Some(model) => Ok(model.clone()),
        }
    }

    fn invoke(&self, handle: &MockModel, features: &FeatureVector) -> Result<f64, InferenceError> {
        match handle {
            MockModel::Constant(v) => Ok(*v),
            MockModel::Echo(column) => features
                .get(column)
                .map(f64::from)
                .ok_or_else(|| InferenceError::new(format!("no column {}", column))),
            MockModel::Failing | MockModel::Corrupt => Err(InferenceError::new("mock failure")),
        }
    }
}

/// Registry with the given handles registered directly.
pub fn registry_with(models: &[(ModelId, MockModel)]) -> ModelRegistry<MockBackend> {
    let mut registry = ModelRegistry::new(MockBackend::new());
    for (id, model) in models {
        registry.register(*id, model.clone());
    }
    registry
}
