//! FIM Prediction Service - Main Entry Point
//!
//! Loads the model registry once, then answers prediction, readiness and
//! history requests over NATS request/reply.

use anyhow::Result;
use async_nats::Subscriber;
use fim_prediction_service::{
    config::AppConfig,
    consumer::RequestConsumer,
    error::{HistoryError, ServiceError},
    feature_extractor::FeatureExtractor,
    history::{HistoryQuery, HistoryStore},
    metrics::{MetricsReporter, ServiceMetrics},
    models::{ModelFiles, ModelRegistry, OnnxBackend},
    producer::ReplyProducer,
    service::{run_blocking, FimPredictor, PredictionReport},
    types::{EnsembleResponse, PredictionRequest},
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type Predictor = FimPredictor<OnnxBackend>;

/// A served prediction with the request it answers
type Served = (PredictionRequest, EnsembleResponse, PredictionReport);

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config)?;

    info!("Starting FIM Prediction Service");
    info!(
        models_dir = %config.models.models_dir,
        workers = config.pipeline.workers,
        timeout_ms = config.pipeline.timeout_ms,
        history = config.history.enabled,
        "Configuration loaded successfully"
    );

    let extractor = FeatureExtractor::new();
    debug!(
        count = extractor.feature_count(),
        names = ?extractor.feature_names(),
        "Model input schema"
    );

    // Load every model before serving; missing files only shrink the registry
    let backend = OnnxBackend::new(config.models.onnx_threads, config.models.sessions_per_model)?;
    let registry = ModelRegistry::load(backend, &ModelFiles::from_config(&config.models));
    if registry.is_empty() {
        warn!(
            models_dir = %config.models.models_dir,
            "No models loaded, prediction requests will be answered as unavailable"
        );
    }

    let predictor = Arc::new(FimPredictor::new(Arc::new(registry)));
    let readiness = predictor.readiness();
    info!(
        loaded = readiness.loaded_count,
        models = ?readiness.loaded_identifiers,
        "Model registry ready"
    );

    let history = if config.history.enabled {
        Some(Arc::new(HistoryStore::open(&config.history.database_path)?))
    } else {
        None
    };

    let metrics = Arc::new(ServiceMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(client.clone(), &config.nats);
    let producer = ReplyProducer::new(client.clone());

    let metrics_clone = metrics.clone();
    let interval = config.pipeline.metrics_interval_secs;
    tokio::spawn(async move {
        MetricsReporter::new(metrics_clone, interval).start().await;
    });

    // Readiness queries are cheap and answered inline
    let mut health = consumer.subscribe_health().await?;
    let health_predictor = predictor.clone();
    let health_producer = producer.clone();
    tokio::spawn(async move {
        while let Some(message) = health.next().await {
            let readiness = health_predictor.readiness();
            if let Err(e) = health_producer.reply(&message, &readiness).await {
                error!(error = %e, "Failed to publish readiness reply");
            }
        }
    });

    if let Some(store) = &history {
        let recent = consumer.subscribe_history().await?;
        let stats = consumer.subscribe_history_stats().await?;
        tokio::spawn(serve_history(
            recent,
            stats,
            store.clone(),
            producer.clone(),
            config.history.default_limit,
        ));
    }

    let semaphore = Arc::new(Semaphore::new(config.pipeline.workers.max(1)));
    let timeout = Duration::from_millis(config.pipeline.timeout_ms);
    let mut subscription = consumer.subscribe_predictions().await?;
    info!(
        predict = %config.nats.predict_subject,
        health = %config.nats.health_subject,
        "Serving requests"
    );

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits in-flight inference)
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        let predictor = predictor.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let history = history.clone();

        tokio::spawn(async move {
            let request_id = Uuid::new_v4();
            let start_time = Instant::now();

            let outcome = match serde_json::from_slice::<PredictionRequest>(&message.payload) {
                Ok(request) => predict(predictor, request, permit, timeout).await,
                Err(e) => Err(ServiceError::InvalidRequest(e.to_string())),
            };

            let published = match outcome {
                Ok((request, response, report)) => {
                    let processing_time = start_time.elapsed();
                    metrics.record_prediction(processing_time, &report);

                    if report.degraded.is_empty() {
                        debug!(
                            request_id = %request_id,
                            total = response.total,
                            processing_time_us = processing_time.as_micros(),
                            "Prediction served"
                        );
                    } else {
                        info!(
                            request_id = %request_id,
                            total = response.total,
                            degraded = ?report.degraded,
                            processing_time_us = processing_time.as_micros(),
                            "Prediction served with degraded items"
                        );
                    }

                    if let Some(store) = history {
                        record_history(store, request_id, request, response.clone());
                    }
                    producer.reply(&message, &response).await
                }
                Err(err) => {
                    metrics.record_failure(err.kind());
                    warn!(request_id = %request_id, error = %err, "Prediction request failed");
                    producer.reply_error(&message, &err).await
                }
            };

            if let Err(e) = published {
                error!(request_id = %request_id, error = %e, "Failed to publish prediction reply");
            }
        });
    }

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

/// Predict on a blocking thread that holds the request's worker permit.
async fn predict(
    predictor: Arc<Predictor>,
    request: PredictionRequest,
    permit: OwnedSemaphorePermit,
    timeout: Duration,
) -> Result<Served, ServiceError> {
    run_blocking(permit, timeout, move || {
        predictor
            .predict_with_report(&request)
            .map(|(response, report)| (request, response, report))
    })
    .await
}

/// Store a served prediction without delaying the reply.
fn record_history(
    store: Arc<HistoryStore>,
    request_id: Uuid,
    request: PredictionRequest,
    response: EnsembleResponse,
) {
    tokio::task::spawn_blocking(move || match store.record(&request, &response) {
        Ok(id) => debug!(request_id = %request_id, history_id = id, "Prediction recorded"),
        Err(e) => error!(request_id = %request_id, error = %e, "Failed to record prediction"),
    });
}

/// Answer recent-history and statistics queries.
async fn serve_history(
    mut recent: Subscriber,
    mut stats: Subscriber,
    store: Arc<HistoryStore>,
    producer: ReplyProducer,
    default_limit: usize,
) {
    loop {
        let published = tokio::select! {
            Some(message) = recent.next() => {
                let reply = match HistoryQuery::from_payload(&message.payload) {
                    Ok(query) => {
                        let store = store.clone();
                        let limit = query.limit.unwrap_or(default_limit);
                        query_history(move || store.recent(limit, query.offset)).await
                    }
                    Err(e) => Err(ServiceError::InvalidRequest(e.to_string())),
                };
                match reply {
                    Ok(page) => producer.reply(&message, &page).await,
                    Err(err) => producer.reply_error(&message, &err).await,
                }
            }
            Some(message) = stats.next() => {
                let store = store.clone();
                match query_history(move || store.stats()).await {
                    Ok(summary) => producer.reply(&message, &summary).await,
                    Err(err) => producer.reply_error(&message, &err).await,
                }
            }
            else => break,
        };

        if let Err(e) = published {
            error!(error = %e, "Failed to publish history reply");
        }
    }
}

async fn query_history<T, F>(query: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, HistoryError> + Send + 'static,
{
    match tokio::task::spawn_blocking(query).await {
        Ok(result) => result.map_err(|e| {
            warn!(error = %e, "History query failed");
            ServiceError::from(e)
        }),
        Err(join_error) => Err(ServiceError::ProcessingFailed(join_error.to_string())),
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let level = &config.logging.level;
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("fim_prediction_service={}", level).parse()?)
        .add_directive(format!("fim_predictor={}", level).parse()?);

    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}
