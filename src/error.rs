//! Error types for model loading, inference and the prediction boundary.

use crate::models::id::ModelId;
use std::path::PathBuf;
use thiserror::Error;

/// A model file could not be turned into a handle.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to load model from {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("model at {} expects {found} input features, schema has {expected}", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

/// The backend raised an error while running a model.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct InferenceError(pub String);

impl InferenceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model {0} is not loaded")]
    NotLoaded(ModelId),
}

/// Failure of a single per-identifier prediction. Always recovered locally.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("model {0} is unavailable")]
    ModelUnavailable(ModelId),

    #[error("inference failed for {model}: {cause}")]
    InferenceFailed {
        model: ModelId,
        #[source]
        cause: InferenceError,
    },
}

/// Failure reading or writing the prediction history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("history record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("stored timestamp is not RFC 3339: {0}")]
    Timestamp(String),

    #[error("history connection lock poisoned")]
    Poisoned,
}

/// Caller-visible failure of the prediction boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no models are loaded")]
    RegistryEmpty,

    #[error("prediction processing failed: {0}")]
    ProcessingFailed(String),

    #[error("invalid prediction request: {0}")]
    InvalidRequest(String),
}

impl ServiceError {
    /// HTTP-style status carried in error replies.
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::RegistryEmpty => 503,
            ServiceError::ProcessingFailed(_) => 500,
            ServiceError::InvalidRequest(_) => 422,
        }
    }

    /// Machine readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::RegistryEmpty => "service_unavailable",
            ServiceError::ProcessingFailed(_) => "processing_failed",
            ServiceError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<HistoryError> for ServiceError {
    fn from(err: HistoryError) -> Self {
        ServiceError::ProcessingFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status() {
        assert_eq!(ServiceError::RegistryEmpty.status(), 503);
        assert_eq!(ServiceError::ProcessingFailed("boom".into()).status(), 500);
        assert_eq!(ServiceError::InvalidRequest("bad".into()).kind(), "invalid_request");
    }

    #[test]
    fn test_history_error_is_processing_failure() {
        let err = ServiceError::from(HistoryError::Poisoned);
        assert_eq!(err.status(), 500);
        assert_eq!(err.kind(), "processing_failed");
    }

    #[test]
    fn test_prediction_error_message() {
        let err = PredictionError::InferenceFailed {
            model: ModelId::Gait,
            cause: InferenceError::new("nan output"),
        };
        assert_eq!(err.to_string(), "inference failed for gait: nan output");
    }
}
