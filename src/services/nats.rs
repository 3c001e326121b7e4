//! Domain events over NATS.

use async_trait::async_trait;
use super::{EventPublisher, ServiceError};
use crate::domain::events::DomainEvent;

pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self { Self { client, prefix: prefix.into() } }

    pub fn subject_for(&self, event: &DomainEvent) -> String { format!("{}.{}", self.prefix, event.kind()) }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), ServiceError> {
        let payload = serde_json::to_vec(event).map_err(|e| ServiceError::Decode(e.to_string()))?;
        let subject = self.subject_for(event);
        self.client.publish(subject.clone(), payload.into()).await.map_err(|e| ServiceError::Transport(e.to_string()))?;
        tracing::debug!(%subject, "published domain event");
        Ok(())
    }
}
