//! Kafka transports (requires the `kafka` feature)
//!
//! - [`KafkaStockProvider`]: keeps the latest quote per symbol from a topic
//! - [`KafkaRelay`]: relays free-text messages from a topic
//! - [`KafkaDelivery`]: publishes alerts to a topic
//!
//! ## Message Formats
//!
//! Quotes (prices may be numbers or strings):
//! ```json
//! {"symbol": "PETR4", "price": 31.2, "dayHigh": "31.9", "dayLow": 30.8}
//! ```
//!
//! Relay messages:
//! ```json
//! {"content": "rebalance at close"}
//! ```
//!
//! Published alerts:
//! ```json
//! {"topic": "PETR4 monitor - BUY", "message": "..."}
//! ```
//!
//! ## Configuration
//!
//! Environment variables:
//! - `KAFKA_BROKERS`: Comma-separated list of brokers (default: localhost:9092)
//! - `KAFKA_GROUP_ID`: Consumer group prefix, suffixed with the topic (default: stockwatch)
//! - `KAFKA_AUTO_OFFSET_RESET`: Where to start if no offset (default: latest)
//! - `STOCKWATCH_KAFKA_STOCK_TOPIC` (default: stocks)
//! - `STOCKWATCH_KAFKA_RELAY_TOPIC` (default: relay)
//! - `STOCKWATCH_KAFKA_ALERT_TOPIC` (default: alerts)

pub mod publisher;
pub mod relay;
pub mod stock;

pub use publisher::KafkaDelivery;
pub use relay::KafkaRelay;
pub use stock::KafkaStockProvider;

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{env_parse, env_string, ConfigError};

/// Kafka client configuration
#[derive(Debug, Clone)]
pub struct PubSubConfig {
    /// Kafka broker addresses
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Auto offset reset (earliest or latest)
    pub auto_offset_reset: String,
    pub stock_topic: String,
    pub relay_topic: String,
    pub alert_topic: String,
    /// Publish timeout in ms
    pub publish_timeout_ms: u64,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "stockwatch".to_string(),
            auto_offset_reset: "latest".to_string(),
            stock_topic: "stocks".to_string(),
            relay_topic: "relay".to_string(),
            alert_topic: "alerts".to_string(),
            publish_timeout_ms: 5000,
        }
    }
}

impl PubSubConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            brokers: env_string("KAFKA_BROKERS").unwrap_or(defaults.brokers),
            group_id: env_string("KAFKA_GROUP_ID").unwrap_or(defaults.group_id),
            auto_offset_reset: env_string("KAFKA_AUTO_OFFSET_RESET")
                .unwrap_or(defaults.auto_offset_reset),
            stock_topic: env_string("STOCKWATCH_KAFKA_STOCK_TOPIC").unwrap_or(defaults.stock_topic),
            relay_topic: env_string("STOCKWATCH_KAFKA_RELAY_TOPIC").unwrap_or(defaults.relay_topic),
            alert_topic: env_string("STOCKWATCH_KAFKA_ALERT_TOPIC").unwrap_or(defaults.alert_topic),
            publish_timeout_ms: env_parse(
                "STOCKWATCH_KAFKA_PUBLISH_TIMEOUT_MS",
                defaults.publish_timeout_ms,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("kafka_stock_topic", &self.stock_topic),
            ("kafka_relay_topic", &self.relay_topic),
            ("kafka_alert_topic", &self.alert_topic),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::OutOfRange {
                    field,
                    reason: "must not be empty",
                });
            }
        }
        if !matches!(self.auto_offset_reset.as_str(), "earliest" | "latest") {
            return Err(ConfigError::Invalid {
                key: "KAFKA_AUTO_OFFSET_RESET".to_string(),
                value: self.auto_offset_reset.clone(),
            });
        }
        Ok(())
    }

    /// Consumer group for one topic's subscriber
    fn group_for(&self, topic: &str) -> String {
        format!("{}-{}", self.group_id, topic)
    }

    fn consumer(&self, topic: &str) -> Result<StreamConsumer, KafkaError> {
        ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", self.group_for(topic))
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set("session.timeout.ms", "30000")
            .create()
    }
}

/// Payload handling errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    Invalid(&'static str),
}

/// Subscribe to `topic` and feed every payload to `handler` until `cancel`
/// fires. Bad payloads are logged and dropped.
pub(crate) fn spawn_subscriber<F>(
    config: &PubSubConfig,
    topic: &str,
    cancel: CancellationToken,
    mut handler: F,
) -> Result<JoinHandle<()>, KafkaError>
where
    F: FnMut(&[u8]) -> Result<(), ParseError> + Send + 'static,
{
    let consumer = config.consumer(topic)?;
    consumer.subscribe(&[topic])?;
    tracing::info!(topic = %topic, "Subscribed to Kafka topic");

    let topic = topic.to_string();
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(topic = %topic, "Kafka subscriber shutting down");
                    break;
                }
                result = consumer.recv() => {
                    match result {
                        Ok(message) => {
                            let Some(payload) = message.payload() else {
                                continue;
                            };
                            if let Err(e) = handler(payload) {
                                tracing::warn!(
                                    topic = %topic,
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Dropping malformed message"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(topic = %topic, error = %e, "Kafka receive error");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubsub_config_default() {
        let config = PubSubConfig::default();
        assert_eq!(config.brokers, "localhost:9092");
        assert_eq!(config.group_id, "stockwatch");
        assert_eq!(config.alert_topic, "alerts");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_each_topic_gets_its_own_group() {
        let config = PubSubConfig::default();

        assert_eq!(config.group_for(&config.stock_topic), "stockwatch-stocks");
        assert_eq!(config.group_for(&config.relay_topic), "stockwatch-relay");
        assert_ne!(
            config.group_for(&config.stock_topic),
            config.group_for(&config.relay_topic)
        );
    }

    #[test]
    fn test_blank_topic_rejected() {
        let config = PubSubConfig {
            relay_topic: " ".to_string(),
            ..PubSubConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "kafka_relay_topic",
                ..
            })
        ));
    }
}
