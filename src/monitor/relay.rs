//! Relay monitor: forwards every relayed message as an alert

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::MonitorStrategy;
use crate::alerts::Alert;
use crate::error::SetupError;
use crate::providers::MessageRelay;

/// Topic given to every relayed alert
pub const RELAY_ALERT_TOPIC: &str = "Relayed message alert";

pub struct RelayMonitor {
    relay: Box<dyn MessageRelay>,
}

impl RelayMonitor {
    pub fn new(relay: Box<dyn MessageRelay>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl MonitorStrategy for RelayMonitor {
    fn name(&self) -> &str {
        "relay"
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        self.relay.setup(cancel).await
    }

    async fn monitor(&mut self) -> Option<Vec<Alert>> {
        let messages = self.relay.drain()?;

        let alerts: Vec<Alert> = messages
            .into_iter()
            .map(|m| Alert::new(RELAY_ALERT_TOPIC, m.content))
            .collect();

        tracing::debug!(alerts = alerts.len(), "Relay messages drained");
        Some(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MessageInbox, RelayMessage};

    struct BrokenRelay;

    #[async_trait]
    impl MessageRelay for BrokenRelay {
        async fn setup(&mut self, _cancel: &CancellationToken) -> Result<(), SetupError> {
            Ok(())
        }

        fn drain(&mut self) -> Option<Vec<RelayMessage>> {
            None
        }
    }

    #[tokio::test]
    async fn test_messages_map_one_to_one_in_order() {
        let inbox = MessageInbox::new();
        let mut monitor = RelayMonitor::new(Box::new(inbox.clone()));
        monitor.setup(&CancellationToken::new()).await.unwrap();

        for content in ["first", "second"] {
            inbox.push(RelayMessage {
                content: content.to_string(),
            });
        }

        let alerts = monitor.monitor().await.unwrap();
        assert_eq!(
            alerts,
            vec![
                Alert::new(RELAY_ALERT_TOPIC, "first"),
                Alert::new(RELAY_ALERT_TOPIC, "second"),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_drain_is_not_a_failure() {
        let mut monitor = RelayMonitor::new(Box::new(MessageInbox::new()));
        assert_eq!(monitor.monitor().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_relay_failure_propagates() {
        let mut monitor = RelayMonitor::new(Box::new(BrokenRelay));
        assert_eq!(monitor.monitor().await, None);
    }
}
