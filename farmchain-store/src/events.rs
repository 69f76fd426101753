use async_trait::async_trait;
use tracing::info;

use farmchain_shared::OrderEvent;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker error: {0}")]
    Broker(String),
}

/// Destination for relayed outbox events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError>;
}

/// Writes events to the log. Used when no broker is configured.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        info!(order_id = %event.order_id, event = event.name(), %payload, "Order event");
        Ok(())
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaPublisher;

#[cfg(feature = "kafka")]
mod kafka {
    use async_trait::async_trait;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::{error, info};

    use farmchain_shared::OrderEvent;

    use super::{EventPublisher, PublishError};

    #[derive(Clone)]
    pub struct KafkaPublisher {
        producer: FutureProducer,
        topic: String,
    }

    impl KafkaPublisher {
        pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self {
                producer,
                topic: topic.to_string(),
            })
        }
    }

    #[async_trait]
    impl EventPublisher for KafkaPublisher {
        async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
            let payload = serde_json::to_string(event)?;
            // Keyed by order so one order's events stay on one partition, in order.
            let record = FutureRecord::to(&self.topic)
                .key(&event.order_id)
                .payload(&payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!(
                        "Sent {} for {} to {}: partition {} offset {}",
                        event.name(),
                        event.order_id,
                        self.topic,
                        delivery.partition,
                        delivery.offset
                    );
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!("Failed to send message to {}: {}", self.topic, e);
                    Err(PublishError::Broker(e.to_string()))
                }
            }
        }
    }
}
