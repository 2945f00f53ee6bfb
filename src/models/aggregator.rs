//! Domain total aggregation with tiered fallback

use crate::error::PredictionError;
use crate::feature_extractor::FeatureVector;
use crate::models::backend::ModelBackend;
use crate::models::id::ModelId;
use crate::models::inference::PredictionEngine;
use std::time::{Duration, Instant};
use tracing::debug;

/// Which tier produced a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalSource {
    /// Dedicated aggregate model
    Model,
    /// Sum of the domain's item predictions
    ItemSum,
    /// Motor total plus cognitive total
    DomainSum,
}

impl TotalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TotalSource::Model => "model",
            TotalSource::ItemSum => "item_sum",
            TotalSource::DomainSum => "domain_sum",
        }
    }
}

/// One aggregate value and its origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Total {
    pub value: f64,
    pub source: TotalSource,
    /// Time spent in the dedicated model, when one was loaded and invoked
    pub elapsed: Option<Duration>,
}

/// Motor, cognitive and grand totals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub motor: Total,
    pub cognitive: Total,
    pub total: Total,
}

impl Totals {
    /// Backend time of every aggregate model that was invoked.
    pub fn model_times(&self) -> impl Iterator<Item = (ModelId, Duration)> {
        [
            (ModelId::MotionTotal, self.motor.elapsed),
            (ModelId::CognitiveTotal, self.cognitive.elapsed),
            (ModelId::Total, self.total.elapsed),
        ]
        .into_iter()
        .filter_map(|(model, elapsed)| elapsed.map(|e| (model, e)))
    }
}

/// Computes totals, preferring dedicated models and falling back to sums.
pub struct ScoreAggregator;

impl ScoreAggregator {
    /// Aggregate item scores into domain and grand totals.
    ///
    /// `motor` and `cognitive` are the already degraded item scores. Always
    /// produces a numeric result.
    pub fn aggregate<B: ModelBackend>(
        engine: &PredictionEngine<B>,
        features: &FeatureVector,
        motor: &[f64],
        cognitive: &[f64],
    ) -> Totals {
        let motor_total = Self::resolve(
            Self::timed(engine, ModelId::MotionTotal, features),
            TotalSource::ItemSum,
            || motor.iter().sum(),
        );
        let cognitive_total = Self::resolve(
            Self::timed(engine, ModelId::CognitiveTotal, features),
            TotalSource::ItemSum,
            || cognitive.iter().sum(),
        );
        let total = Self::resolve(
            Self::timed(engine, ModelId::Total, features),
            TotalSource::DomainSum,
            || motor_total.value + cognitive_total.value,
        );

        debug!(
            motor_total = motor_total.value,
            motor_source = motor_total.source.as_str(),
            cognitive_total = cognitive_total.value,
            cognitive_source = cognitive_total.source.as_str(),
            total = total.value,
            total_source = total.source.as_str(),
            "Aggregation complete"
        );

        Totals {
            motor: motor_total,
            cognitive: cognitive_total,
            total,
        }
    }

    /// Run a dedicated aggregate model; no time is reported when it is not loaded.
    fn timed<B: ModelBackend>(
        engine: &PredictionEngine<B>,
        id: ModelId,
        features: &FeatureVector,
    ) -> (Result<f64, PredictionError>, Option<Duration>) {
        let start = Instant::now();
        let outcome = engine.predict_unclamped(id, features);
        let elapsed = match outcome {
            Err(PredictionError::ModelUnavailable(_)) => None,
            _ => Some(start.elapsed()),
        };
        (outcome, elapsed)
    }

    /// First applicable tier wins: the dedicated model, else the fallback.
    fn resolve(
        (dedicated, elapsed): (Result<f64, PredictionError>, Option<Duration>),
        fallback_source: TotalSource,
        fallback: impl FnOnce() -> f64,
    ) -> Total {
        match dedicated {
            Ok(value) => Total {
                value,
                source: TotalSource::Model,
                elapsed,
            },
            Err(e) => {
                debug!(error = %e, fallback = fallback_source.as_str(), "Aggregate model unusable");
                Total {
                    value: fallback(),
                    source: fallback_source,
                    elapsed,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FeatureExtractor;
    use crate::models::testing::{registry_with, MockModel};
    use crate::types::request::{CareLevel, Gender, PredictionRequest};
    use std::sync::Arc;

    fn features() -> FeatureVector {
        FeatureExtractor::new().build(&PredictionRequest::new(
            Gender::Female,
            80.0,
            21.0,
            CareLevel::Yes,
            14.0,
        ))
    }

    const MOTOR: [f64; 12] = [5.0, 4.0, 3.0, 4.0, 4.0, 5.0, 6.0, 6.0, 4.0, 4.0, 3.0, 3.0];
    const COGNITIVE: [f64; 5] = [6.0, 6.0, 5.0, 5.0, 5.0];

    #[test]
    fn test_dedicated_models_win_and_are_unclamped() {
        let engine = PredictionEngine::new(Arc::new(registry_with(&[
            (ModelId::MotionTotal, MockModel::Constant(61.5)),
            (ModelId::CognitiveTotal, MockModel::Constant(29.0)),
            (ModelId::Total, MockModel::Constant(92.25)),
        ])));

        let totals = ScoreAggregator::aggregate(&engine, &features(), &MOTOR, &COGNITIVE);

        assert_eq!(totals.motor.value, 61.5);
        assert_eq!(totals.cognitive.value, 29.0);
        assert_eq!(totals.total.value, 92.25);
        assert_eq!(totals.total.source, TotalSource::Model);

        let timed: Vec<_> = totals.model_times().map(|(model, _)| model).collect();
        assert_eq!(
            timed,
            vec![ModelId::MotionTotal, ModelId::CognitiveTotal, ModelId::Total]
        );
    }

    #[test]
    fn test_missing_models_fall_back_to_sums() {
        let engine = PredictionEngine::new(Arc::new(registry_with(&[])));

        let totals = ScoreAggregator::aggregate(&engine, &features(), &MOTOR, &COGNITIVE);

        assert_eq!(totals.motor.value, 51.0);
        assert_eq!(totals.motor.source, TotalSource::ItemSum);
        assert_eq!(totals.cognitive.value, 27.0);
        assert_eq!(totals.total.value, 78.0);
        assert_eq!(totals.total.source, TotalSource::DomainSum);
        assert_eq!(totals.model_times().count(), 0);
    }

    #[test]
    fn test_failed_aggregate_model_falls_back() {
        let engine = PredictionEngine::new(Arc::new(registry_with(&[
            (ModelId::MotionTotal, MockModel::Failing),
            (ModelId::CognitiveTotal, MockModel::Constant(30.0)),
            (ModelId::Total, MockModel::Failing),
        ])));

        let totals = ScoreAggregator::aggregate(&engine, &features(), &MOTOR, &COGNITIVE);

        assert_eq!(totals.motor.value, 51.0);
        assert_eq!(totals.cognitive.source, TotalSource::Model);
        // Grand total uses whichever values the domain tiers produced.
        assert_eq!(totals.total.value, 81.0);
        // A failing model still ran, so its time is reported.
        assert_eq!(totals.model_times().count(), 3);
    }
}
