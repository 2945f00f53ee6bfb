//! Boundary to the model execution backend.

use crate::error::{InferenceError, LoadError};
use crate::feature_extractor::FeatureVector;
use std::path::Path;

/// Loads serialized models and runs them against feature vectors.
///
/// Handles are opaque to the rest of the crate. They are owned by the
/// registry and shared read-only across concurrent requests.
pub trait ModelBackend: Send + Sync {
    type Handle: Send + Sync;

    fn load_model(&self, path: &Path) -> Result<Self::Handle, LoadError>;

    fn invoke(&self, handle: &Self::Handle, features: &FeatureVector) -> Result<f64, InferenceError>;
}
