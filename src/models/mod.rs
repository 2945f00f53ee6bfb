//! Model registry, backends and inference

pub mod aggregator;
pub mod backend;
pub mod id;
pub mod inference;
pub mod onnx;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::ScoreAggregator;
pub use backend::ModelBackend;
pub use id::ModelId;
pub use inference::PredictionEngine;
pub use onnx::OnnxBackend;
pub use registry::{ModelFiles, ModelRegistry};
