//! Prediction and readiness boundaries.
//!
//! Ties feature extraction, per-item inference, aggregation and response
//! assembly together for one request.

use crate::error::ServiceError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::aggregator::{ScoreAggregator, Totals};
use crate::models::backend::ModelBackend;
use crate::models::id::ModelId;
use crate::models::inference::{ItemPrediction, PredictionEngine};
use crate::models::registry::ModelRegistry;
use crate::types::request::PredictionRequest;
use crate::types::response::{EnsembleResponse, Readiness};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

/// What happened while serving one prediction, for metrics and logs
#[derive(Debug, Clone)]
pub struct PredictionReport {
    /// Items that fell back to the degraded score
    pub degraded: Vec<ModelId>,
    /// Backend time per item and aggregate model that was invoked
    pub model_times: Vec<(ModelId, Duration)>,
    pub totals: Totals,
}

/// Serves FIM predictions from a loaded model registry
pub struct FimPredictor<B: ModelBackend> {
    engine: PredictionEngine<B>,
    extractor: FeatureExtractor,
}

impl<B: ModelBackend> FimPredictor<B> {
    pub fn new(registry: Arc<ModelRegistry<B>>) -> Self {
        Self {
            engine: PredictionEngine::new(registry),
            extractor: FeatureExtractor::new(),
        }
    }

    /// Readiness snapshot: ready iff at least one model is loaded.
    pub fn readiness(&self) -> Readiness {
        let registry = self.engine.registry();
        let loaded = registry.loaded_identifiers();

        Readiness {
            ready: !loaded.is_empty(),
            loaded_count: loaded.len(),
            loaded_identifiers: loaded.iter().map(|id| id.key().to_string()).collect(),
        }
    }

    pub fn predict(&self, request: &PredictionRequest) -> Result<EnsembleResponse, ServiceError> {
        self.predict_with_report(request).map(|(response, _)| response)
    }

    /// Predict discharge scores for a request.
    ///
    /// Fails only when no model is loaded at all, or when the assembled
    /// result is not numeric. Individual model failures are degraded.
    pub fn predict_with_report(
        &self,
        request: &PredictionRequest,
    ) -> Result<(EnsembleResponse, PredictionReport), ServiceError> {
        if self.engine.registry().is_empty() {
            return Err(ServiceError::RegistryEmpty);
        }

        let features = self.extractor.build(request);

        let motor_items = self.engine.predict_items(&ModelId::MOTOR_ITEMS, &features);
        let cognitive_items = self.engine.predict_items(&ModelId::COGNITIVE_ITEMS, &features);

        let motor: [f64; 12] = std::array::from_fn(|i| motor_items[i].score());
        let cognitive: [f64; 5] = std::array::from_fn(|i| cognitive_items[i].score());

        let totals = ScoreAggregator::aggregate(&self.engine, &features, &motor, &cognitive);

        for (name, value) in [
            ("motion_total", totals.motor.value),
            ("cognitive_total", totals.cognitive.value),
            ("total", totals.total.value),
        ] {
            if !value.is_finite() {
                return Err(ServiceError::ProcessingFailed(format!(
                    "{} is not a finite number: {}",
                    name, value
                )));
            }
        }

        let response = EnsembleResponse::assemble(
            motor,
            cognitive,
            totals.motor.value,
            totals.cognitive.value,
            totals.total.value,
        );

        let items = motor_items.iter().chain(cognitive_items.iter());
        let report = PredictionReport {
            degraded: items
                .clone()
                .filter(|item| item.is_degraded())
                .map(|item| item.model)
                .collect(),
            model_times: items
                .filter(|item| self.engine.registry().is_loaded(item.model))
                .map(|item: &ItemPrediction| (item.model, item.elapsed))
                .chain(totals.model_times())
                .collect(),
            totals,
        };

        debug!(
            degraded = report.degraded.len(),
            total = response.total,
            "Prediction assembled"
        );

        Ok((response, report))
    }
}

/// Run blocking prediction work off the async runtime, bounded by `timeout`.
///
/// The permit is released when the work returns, not when the caller stops
/// waiting, so work that outlives its timeout still occupies a worker slot.
pub async fn run_blocking<T, F>(
    permit: OwnedSemaphorePermit,
    timeout: Duration,
    work: F,
) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || {
        let result = work();
        drop(permit);
        result
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ServiceError::ProcessingFailed(join_error.to_string())),
        Err(_) => Err(ServiceError::ProcessingFailed(format!(
            "prediction exceeded {} ms",
            timeout.as_millis()
        ))),
    }
}
