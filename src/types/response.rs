//! Prediction response and readiness data structures

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};

/// Value reported for the stair-climbing item, which has no model.
pub const STAIRS_PLACEHOLDER: f64 = 0.0;

/// Predicted discharge FIM scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleResponse {
    /// 12 motor item predictions in clinical order, then the stairs placeholder
    pub motion: Vec<f64>,
    /// 5 cognitive item predictions in clinical order
    pub cognitive: Vec<f64>,
    pub motion_total: f64,
    pub cognitive_total: f64,
    pub total: f64,
}

impl EnsembleResponse {
    /// Package per-item predictions and totals into a response.
    pub fn assemble(
        motor: [f64; 12],
        cognitive: [f64; 5],
        motion_total: f64,
        cognitive_total: f64,
        total: f64,
    ) -> Self {
        let mut motion = Vec::with_capacity(13);
        motion.extend_from_slice(&motor);
        motion.push(STAIRS_PLACEHOLDER);

        Self {
            motion,
            cognitive: cognitive.to_vec(),
            motion_total,
            cognitive_total,
            total,
        }
    }

    /// Motor predictions without the trailing placeholder.
    pub fn modelled_motion(&self) -> &[f64] {
        &self.motion[..self.motion.len().saturating_sub(1)]
    }
}

/// Readiness snapshot for health checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub ready: bool,
    pub loaded_count: usize,
    pub loaded_identifiers: Vec<String>,
}

/// Error body returned to callers of the prediction boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub status: u16,
    pub error: String,
    pub detail: String,
}

impl From<&ServiceError> for ErrorReply {
    fn from(err: &ServiceError) -> Self {
        Self {
            status: err.status(),
            error: err.kind().to_string(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_appends_placeholder() {
        let response = EnsembleResponse::assemble(
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            [6.0, 6.0, 5.0, 5.0, 5.0],
            43.0,
            27.0,
            70.0,
        );

        assert_eq!(response.motion.len(), 13);
        assert_eq!(*response.motion.last().unwrap(), STAIRS_PLACEHOLDER);
        assert_eq!(response.modelled_motion().len(), 12);
        assert_eq!(response.cognitive, vec![6.0, 6.0, 5.0, 5.0, 5.0]);
        assert_eq!(response.total, 70.0);
    }

    #[test]
    fn test_response_field_names() {
        let response = EnsembleResponse::assemble([0.0; 12], [0.0; 5], 0.0, 0.0, 0.0);
        let json = serde_json::to_value(&response).unwrap();

        for field in ["motion", "cognitive", "motionTotal", "cognitiveTotal", "total"] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
    }

    #[test]
    fn test_error_reply_from_service_error() {
        let reply = ErrorReply::from(&ServiceError::RegistryEmpty);
        assert_eq!(reply.status, 503);
        assert_eq!(reply.error, "service_unavailable");
    }
}
