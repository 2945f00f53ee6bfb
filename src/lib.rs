//! FIM Prediction Service Library
//!
//! Predicts discharge FIM (Functional Independence Measure) item scores and
//! domain totals from admission data using an ensemble of per-item
//! regression models.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod history;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::ServiceError;
pub use feature_extractor::{FeatureExtractor, FeatureVector, FEATURE_NAMES};
pub use history::HistoryStore;
pub use models::{ModelBackend, ModelId, ModelRegistry, OnnxBackend, PredictionEngine};
pub use producer::ReplyProducer;
pub use service::FimPredictor;
pub use types::{EnsembleResponse, PredictionRequest, Readiness};
