//! Domain-event publishing over NATS.

use crate::domain::events::DomainEvent;

const SUBJECT_PREFIX: &str = "storefront";

/// Publishes events when a NATS client is configured; a no-op otherwise.
#[derive(Clone, Default)]
pub struct EventPublisher { client: Option<async_nats::Client> }

impl EventPublisher {
    pub fn disabled() -> Self { Self::default() }

    /// Connects to `url`. An unreachable server leaves publishing disabled rather than failing startup.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "connected to NATS");
                Self { client: Some(client) }
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, domain events will not be published");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool { self.client.is_some() }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.publish(&event).await;
        }
    }

    pub async fn publish(&self, event: &DomainEvent) {
        let subject = subject_for(event);
        let Some(client) = &self.client else {
            tracing::debug!(%subject, "event publishing disabled");
            return;
        };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(%subject, error = %e, "could not serialize event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(%subject, error = %e, "failed to publish event");
        }
    }
}

pub fn subject_for(event: &DomainEvent) -> String { format!("{SUBJECT_PREFIX}.{}", event.subject()) }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::PaymentEvent;
    use uuid::Uuid;

    #[test]
    fn test_subject_is_prefixed() {
        let event = DomainEvent::Payment(PaymentEvent::Failed { order_id: Uuid::nil() });
        assert_eq!(subject_for(&event), "storefront.payment.failed");
    }

    #[tokio::test]
    async fn test_disabled_publisher_is_silent() {
        let publisher = EventPublisher::connect(None).await;
        assert!(!publisher.is_enabled());
        publisher.publish_all(vec![DomainEvent::Payment(PaymentEvent::Failed { order_id: Uuid::nil() })]).await;
    }
}
