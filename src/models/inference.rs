//! Per-model inference with failure isolation

use crate::error::{InferenceError, PredictionError};
use crate::feature_extractor::FeatureVector;
use crate::models::backend::ModelBackend;
use crate::models::id::ModelId;
use crate::models::registry::ModelRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lowest valid FIM item score
pub const SCORE_MIN: f64 = 0.0;
/// Highest valid FIM item score
pub const SCORE_MAX: f64 = 7.0;
/// Score substituted for an item whose model is unavailable or failed
pub const DEGRADED_SCORE: f64 = 0.0;

/// Outcome of predicting one item
#[derive(Debug)]
pub struct ItemPrediction {
    pub model: ModelId,
    pub outcome: Result<f64, PredictionError>,
    /// Time spent in the backend (zero when no model was loaded)
    pub elapsed: Duration,
}

impl ItemPrediction {
    /// Clamped prediction, or the degraded score when prediction failed
    pub fn score(&self) -> f64 {
        match &self.outcome {
            Ok(score) => *score,
            Err(_) => DEGRADED_SCORE,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.outcome.is_err()
    }
}

/// Runs registered models against feature vectors
pub struct PredictionEngine<B: ModelBackend> {
    registry: Arc<ModelRegistry<B>>,
}

impl<B: ModelBackend> Clone for PredictionEngine<B> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<B: ModelBackend> PredictionEngine<B> {
    pub fn new(registry: Arc<ModelRegistry<B>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry<B> {
        &self.registry
    }

    /// Predict an item score, clamped into [0, 7].
    pub fn predict(&self, id: ModelId, features: &FeatureVector) -> Result<f64, PredictionError> {
        self.predict_unclamped(id, features)
            .map(|score| score.clamp(SCORE_MIN, SCORE_MAX))
    }

    /// Predict without clamping. Used for aggregate models, whose totals are
    /// not bounded by the item range.
    pub fn predict_unclamped(
        &self,
        id: ModelId,
        features: &FeatureVector,
    ) -> Result<f64, PredictionError> {
        let handle = self
            .registry
            .get(id)
            .map_err(|_| PredictionError::ModelUnavailable(id))?;

        let score = self
            .registry
            .backend()
            .invoke(handle, features)
            .map_err(|cause| PredictionError::InferenceFailed { model: id, cause })?;

        if !score.is_finite() {
            return Err(PredictionError::InferenceFailed {
                model: id,
                cause: InferenceError::new(format!("non-finite output {}", score)),
            });
        }

        debug!(model = %id, score = score, "Model inference complete");
        Ok(score)
    }

    /// Predict a batch of items. A failure for one item never affects the others.
    pub fn predict_items(&self, ids: &[ModelId], features: &FeatureVector) -> Vec<ItemPrediction> {
        ids.iter()
            .map(|&model| {
                let start = Instant::now();
                let outcome = self.predict(model, features);
                let elapsed = start.elapsed();

                if let Err(e) = &outcome {
                    match e {
                        PredictionError::ModelUnavailable(_) => {
                            debug!(model = %model, "Model not loaded, using degraded score")
                        }
                        PredictionError::InferenceFailed { .. } => {
                            warn!(model = %model, error = %e, "Model inference failed, using degraded score")
                        }
                    }
                }

                ItemPrediction {
                    model,
                    outcome,
                    elapsed,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FeatureExtractor;
    use crate::models::testing::{registry_with, MockModel};
    use crate::types::request::{CareLevel, Gender, PredictionRequest};

    fn features() -> FeatureVector {
        let request = PredictionRequest::new(Gender::Male, 65.0, 23.5, CareLevel::No, 30.0)
            .with_motion("食事", 5.0)
            .with_motion("歩行", 3.0);
        FeatureExtractor::new().build(&request)
    }

    fn engine(models: &[(ModelId, MockModel)]) -> PredictionEngine<crate::models::testing::MockBackend> {
        PredictionEngine::new(Arc::new(registry_with(models)))
    }

    #[test]
    fn test_predict_clamps_into_item_range() {
        let engine = engine(&[
            (ModelId::Eat, MockModel::Constant(8.3)),
            (ModelId::Groom, MockModel::Constant(-0.4)),
            (ModelId::Bath, MockModel::Constant(4.25)),
        ]);
        let fv = features();

        assert_eq!(engine.predict(ModelId::Eat, &fv).unwrap(), 7.0);
        assert_eq!(engine.predict(ModelId::Groom, &fv).unwrap(), 0.0);
        assert_eq!(engine.predict(ModelId::Bath, &fv).unwrap(), 4.25);
    }

    #[test]
    fn test_predict_unclamped_for_aggregates() {
        let engine = engine(&[(ModelId::Total, MockModel::Constant(96.5))]);
        assert_eq!(engine.predict_unclamped(ModelId::Total, &features()).unwrap(), 96.5);
    }

    #[test]
    fn test_unavailable_and_failed_models() {
        let engine = engine(&[(ModelId::Gait, MockModel::Failing)]);
        let fv = features();

        assert!(matches!(
            engine.predict(ModelId::Eat, &fv),
            Err(PredictionError::ModelUnavailable(ModelId::Eat))
        ));
        assert!(matches!(
            engine.predict(ModelId::Gait, &fv),
            Err(PredictionError::InferenceFailed { model: ModelId::Gait, .. })
        ));
    }

    #[test]
    fn test_non_finite_output_is_failure() {
        let engine = engine(&[(ModelId::Memory, MockModel::Constant(f64::NAN))]);
        assert!(engine.predict(ModelId::Memory, &features()).is_err());
    }

    #[test]
    fn test_predict_items_isolates_failures() {
        let engine = engine(&[
            (ModelId::Eat, MockModel::Echo("食事")),
            (ModelId::Groom, MockModel::Failing),
            (ModelId::Gait, MockModel::Echo("歩行")),
        ]);

        let items = engine.predict_items(&ModelId::MOTOR_ITEMS, &features());
        let scores: Vec<f64> = items.iter().map(ItemPrediction::score).collect();

        assert_eq!(items.len(), 12);
        assert_eq!(scores[0], 5.0);
        assert_eq!(scores[1], 0.0);
        assert_eq!(scores[11], 3.0);
        assert!(items[1].is_degraded());
        assert!(items[2].is_degraded());
        assert!(!items[11].is_degraded());
    }
}
