//! Test Prediction Client
//!
//! Sends a readiness query and a series of generated admission records to the
//! prediction service over NATS, logs the replies, then asks for the
//! prediction history statistics.

use fim_prediction_service::types::{
    CareLevel, EnsembleResponse, ErrorReply, Gender, PredictionRequest, Readiness,
};
use fim_prediction_service::history::HistoryStats;
use fim_prediction_service::ModelId;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Admission record generator for testing
struct PatientGenerator {
    rng: rand::rngs::ThreadRng,
}

impl PatientGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// The reference patient used when validating exported models
    fn reference() -> PredictionRequest {
        let motion = [5.0, 4.0, 3.0, 4.0, 4.0, 5.0, 6.0, 6.0, 4.0, 4.0, 3.0, 3.0];
        let cognitive = [6.0, 6.0, 5.0, 5.0, 5.0];

        let mut request = PredictionRequest::new(Gender::Male, 65.0, 23.5, CareLevel::No, 30.0);
        for (item, score) in ModelId::MOTOR_ITEMS.iter().zip(motion) {
            request = request.with_motion(item.item_label().unwrap_or_default(), score);
        }
        for (item, score) in ModelId::COGNITIVE_ITEMS.iter().zip(cognitive) {
            request = request.with_cognitive(item.item_label().unwrap_or_default(), score);
        }
        request
    }

    /// Generate a random admission record
    fn generate(&mut self) -> PredictionRequest {
        let gender = if self.rng.gen_bool(0.5) {
            Gender::Male
        } else {
            Gender::Female
        };
        let care_level = if self.rng.gen_bool(0.3) {
            CareLevel::Yes
        } else {
            CareLevel::No
        };

        let mut request = PredictionRequest::new(
            gender,
            self.rng.gen_range(40.0..95.0_f64).round(),
            (self.rng.gen_range(15.0..32.0_f64) * 10.0).round() / 10.0,
            care_level,
            self.rng.gen_range(7.0..90.0_f64).round(),
        );

        for item in ModelId::MOTOR_ITEMS {
            let score = self.rng.gen_range(1..=7) as f64;
            request = request.with_motion(item.item_label().unwrap_or_default(), score);
        }
        for item in ModelId::COGNITIVE_ITEMS {
            let score = self.rng.gen_range(1..=7) as f64;
            request = request.with_cognitive(item.item_label().unwrap_or_default(), score);
        }
        request
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Prediction Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let predict_subject = args.get(2).map(|s| s.as_str()).unwrap_or("fim.predict");
    let health_subject = args.get(3).map(|s| s.as_str()).unwrap_or("fim.health");
    let count: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(10);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);
    let stats_subject = args.get(6).map(|s| s.as_str()).unwrap_or("fim.history.stats");

    info!(
        nats_url = %nats_url,
        predict_subject = %predict_subject,
        health_subject = %health_subject,
        count = count,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count).await;
        }
    };

    let health = client
        .request(health_subject.to_string(), Vec::<u8>::new().into())
        .await?;
    let readiness: Readiness = serde_json::from_slice(&health.payload)?;
    info!(
        ready = readiness.ready,
        loaded = readiness.loaded_count,
        models = ?readiness.loaded_identifiers,
        "Service readiness"
    );

    let mut generator = PatientGenerator::new();
    let mut served = 0;
    let mut failed = 0;

    for i in 0..count {
        let request = if i == 0 {
            PatientGenerator::reference()
        } else {
            generator.generate()
        };

        let payload = serde_json::to_vec(&request)?;
        let reply = client.request(predict_subject.to_string(), payload.into()).await?;

        match serde_json::from_slice::<EnsembleResponse>(&reply.payload) {
            Ok(response) => {
                served += 1;
                info!(
                    request = i + 1,
                    motion = ?response.motion,
                    cognitive = ?response.cognitive,
                    motion_total = response.motion_total,
                    cognitive_total = response.cognitive_total,
                    total = response.total,
                    "Prediction received"
                );
            }
            Err(_) => {
                failed += 1;
                let error: ErrorReply = serde_json::from_slice(&reply.payload)?;
                warn!(
                    request = i + 1,
                    status = error.status,
                    error = %error.error,
                    detail = %error.detail,
                    "Prediction failed"
                );
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! {} predictions received, {} failed", served, failed);

    match client.request(stats_subject.to_string(), Vec::<u8>::new().into()).await {
        Ok(reply) => match serde_json::from_slice::<HistoryStats>(&reply.payload) {
            Ok(stats) => info!(
                stored = stats.total,
                avg_total = ?stats.statistics.avg_total,
                min_total = ?stats.statistics.min_total,
                max_total = ?stats.statistics.max_total,
                "Prediction history"
            ),
            Err(e) => warn!(error = %e, "Unexpected history stats reply"),
        },
        Err(e) => warn!(error = %e, "History stats unavailable"),
    }

    Ok(())
}

async fn run_dry_mode(count: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = PatientGenerator::new();
    let reference = serde_json::to_string_pretty(&PatientGenerator::reference())?;
    info!("Reference request:\n{}", reference);

    for i in 1..count.min(3) {
        let json = serde_json::to_string_pretty(&generator.generate())?;
        info!("Sample request {}:\n{}", i + 1, json);
    }

    Ok(())
}
