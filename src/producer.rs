//! NATS replies for prediction and health requests

use crate::error::ServiceError;
use crate::types::response::ErrorReply;
use anyhow::Result;
use async_nats::{Client, Message};
use serde::Serialize;
use tracing::{debug, warn};

/// Publishes JSON replies to the requester's inbox
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Reply to a request with a JSON body.
    ///
    /// Messages published without a reply subject are dropped with a warning.
    pub async fn reply<T: Serialize>(&self, request: &Message, body: &T) -> Result<()> {
        let Some(reply_to) = request.reply.clone() else {
            warn!(subject = %request.subject, "Request has no reply subject, dropping reply");
            return Ok(());
        };

        let payload = serde_json::to_vec(body)?;
        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(reply_to = %reply_to, "Published reply");
        Ok(())
    }

    /// Reply with an error body derived from a service error
    pub async fn reply_error(&self, request: &Message, err: &ServiceError) -> Result<()> {
        self.reply(request, &ErrorReply::from(err)).await
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
