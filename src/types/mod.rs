//! Type definitions for the prediction boundary

pub mod request;
pub mod response;

pub use request::{CareLevel, Gender, PredictionRequest};
pub use response::{EnsembleResponse, ErrorReply, Readiness, STAIRS_PLACEHOLDER};
