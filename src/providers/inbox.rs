//! Thread-safe FIFO inbox for relayed messages

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{MessageRelay, RelayMessage};
use crate::error::SetupError;

/// Shared message inbox.
///
/// Push side is called from subscriber tasks, drain side from the monitor
/// loop. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MessageInbox {
    messages: Arc<Mutex<VecDeque<RelayMessage>>>,
}

impl MessageInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: RelayMessage) {
        self.messages.lock().push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Remove and return everything currently queued
    pub fn take_all(&self) -> Vec<RelayMessage> {
        self.messages.lock().drain(..).collect()
    }
}

#[async_trait]
impl MessageRelay for MessageInbox {
    async fn setup(&mut self, _cancel: &CancellationToken) -> Result<(), SetupError> {
        Ok(())
    }

    fn drain(&mut self) -> Option<Vec<RelayMessage>> {
        Some(self.take_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str) -> RelayMessage {
        RelayMessage {
            content: content.to_string(),
        }
    }

    #[test]
    fn test_drain_is_fifo_and_empties() {
        let mut inbox = MessageInbox::new();
        let producer = inbox.clone();

        producer.push(msg("a"));
        producer.push(msg("b"));
        assert_eq!(inbox.len(), 2);

        assert_eq!(inbox.drain(), Some(vec![msg("a"), msg("b")]));
        assert_eq!(inbox.drain(), Some(vec![]));
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_concurrent_pushes_are_not_lost() {
        let inbox = MessageInbox::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let inbox = inbox.clone();
                std::thread::spawn(move || {
                    for n in 0..250 {
                        inbox.push(msg(&format!("{}-{}", t, n)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(inbox.take_all().len(), 1000);
    }
}
