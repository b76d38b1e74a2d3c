//! Relay message subscriber

use async_trait::async_trait;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{spawn_subscriber, ParseError, PubSubConfig};
use crate::error::SetupError;
use crate::providers::{MessageInbox, MessageRelay, RelayMessage};

#[derive(Debug, Deserialize)]
struct RelayPayload {
    content: String,
}

fn parse_message(payload: &[u8]) -> Result<RelayMessage, ParseError> {
    let parsed: RelayPayload = serde_json::from_slice(payload)?;
    if parsed.content.trim().is_empty() {
        return Err(ParseError::Invalid("empty content"));
    }
    Ok(RelayMessage {
        content: parsed.content,
    })
}

/// Relays messages published on a Kafka topic
pub struct KafkaRelay {
    config: PubSubConfig,
    inbox: MessageInbox,
    subscriber: Option<JoinHandle<()>>,
}

impl KafkaRelay {
    pub fn new(config: PubSubConfig) -> Self {
        Self {
            config,
            inbox: MessageInbox::new(),
            subscriber: None,
        }
    }
}

#[async_trait]
impl MessageRelay for KafkaRelay {
    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        let inbox = self.inbox.clone();
        let handle = spawn_subscriber(
            &self.config,
            &self.config.relay_topic,
            cancel.clone(),
            move |payload| {
                inbox.push(parse_message(payload)?);
                Ok(())
            },
        )
        .map_err(|e| SetupError::Transport(format!("Kafka subscribe failed: {}", e)))?;

        self.subscriber = Some(handle);
        Ok(())
    }

    fn drain(&mut self) -> Option<Vec<RelayMessage>> {
        if self.subscriber.as_ref().is_some_and(|h| h.is_finished()) {
            tracing::warn!(topic = %self.config.relay_topic, "Relay subscriber is no longer running");
            return None;
        }
        Some(self.inbox.take_all())
    }
}

impl Drop for KafkaRelay {
    fn drop(&mut self) {
        if let Some(handle) = self.subscriber.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message() {
        let message = parse_message(br#"{"content": "rebalance at close"}"#).unwrap();
        assert_eq!(message.content, "rebalance at close");
    }

    #[test]
    fn test_parse_message_rejects_empty_content() {
        assert!(matches!(
            parse_message(br#"{"content": "  "}"#),
            Err(ParseError::Invalid(_))
        ));
        assert!(matches!(parse_message(br#"{}"#), Err(ParseError::Json(_))));
    }

    #[test]
    fn test_drain_before_setup_is_empty() {
        let mut relay = KafkaRelay::new(PubSubConfig::default());
        relay.inbox.push(RelayMessage {
            content: "hello".to_string(),
        });

        assert_eq!(relay.drain().map(|m| m.len()), Some(1));
        assert_eq!(relay.drain(), Some(vec![]));
    }
}
