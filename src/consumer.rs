//! NATS subscriptions for incoming prediction, health and history requests

use crate::config::NatsConfig;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving requests from NATS
pub struct RequestConsumer {
    client: Client,
    subjects: NatsConfig,
}

impl RequestConsumer {
    pub fn new(client: Client, subjects: &NatsConfig) -> Self {
        Self {
            client,
            subjects: subjects.clone(),
        }
    }

    async fn subscribe(&self, subject: &str, what: &str) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(subject.to_string()).await?;
        info!(subject = %subject, "Subscribed to {} subject", what);
        Ok(subscriber)
    }

    /// Subscribe to the prediction subject
    pub async fn subscribe_predictions(&self) -> Result<Subscriber> {
        self.subscribe(&self.subjects.predict_subject, "prediction").await
    }

    /// Subscribe to the readiness subject
    pub async fn subscribe_health(&self) -> Result<Subscriber> {
        self.subscribe(&self.subjects.health_subject, "health").await
    }

    /// Subscribe to the recent history subject
    pub async fn subscribe_history(&self) -> Result<Subscriber> {
        self.subscribe(&self.subjects.history_subject, "history").await
    }

    /// Subscribe to the history statistics subject
    pub async fn subscribe_history_stats(&self) -> Result<Subscriber> {
        self.subscribe(&self.subjects.history_stats_subject, "history stats").await
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
