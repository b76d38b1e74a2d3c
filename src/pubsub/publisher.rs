//! Alert publisher

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tokio_util::sync::CancellationToken;

use super::PubSubConfig;
use crate::alerts::Alert;
use crate::delivery::DeliveryStrategy;
use crate::error::SetupError;

/// Publishes each alert once as `{"topic", "message"}` JSON, keyed by topic
pub struct KafkaDelivery {
    config: PubSubConfig,
    producer: Option<FutureProducer>,
    cancel: CancellationToken,
}

impl KafkaDelivery {
    pub fn new(config: PubSubConfig) -> Self {
        Self {
            config,
            producer: None,
            cancel: CancellationToken::new(),
        }
    }

    fn payload(alert: &Alert) -> Result<String, serde_json::Error> {
        serde_json::to_string(alert)
    }

    fn connect(&mut self) -> Result<(), KafkaError> {
        if self.producer.is_none() {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", &self.config.brokers)
                .set("message.timeout.ms", self.config.publish_timeout_ms.to_string())
                .create()?;
            tracing::info!(brokers = %self.config.brokers, "Kafka producer created");
            self.producer = Some(producer);
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryStrategy for KafkaDelivery {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        self.cancel = cancel.clone();
        Ok(())
    }

    async fn send(&mut self, alert: &Alert) -> bool {
        if let Err(e) = self.connect() {
            tracing::error!(error = %e, "Failed to create Kafka producer");
            return false;
        }
        let Some(producer) = self.producer.as_ref() else {
            return false;
        };

        let payload = match Self::payload(alert) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode alert");
                return false;
            }
        };

        let record = FutureRecord::to(&self.config.alert_topic)
            .key(alert.topic())
            .payload(&payload);
        let timeout = Timeout::After(Duration::from_millis(self.config.publish_timeout_ms));

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            result = producer.send(record, timeout) => result,
        };

        match result {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %self.config.alert_topic,
                    partition = partition,
                    offset = offset,
                    "Alert published"
                );
                true
            }
            Err((e, _)) => {
                tracing::warn!(topic = %self.config.alert_topic, error = %e, "Alert publish failed");
                false
            }
        }
    }
}
