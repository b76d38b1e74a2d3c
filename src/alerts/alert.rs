//! Alert record

use serde::{Deserialize, Serialize};

/// An alert produced by a monitor and consumed by delivery channels.
///
/// Alerts carry no identity beyond their content and are never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    topic: String,
    message: String,
}

impl Alert {
    pub fn new(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Short subject line
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Free-text body
    pub fn message(&self) -> &str {
        &self.message
    }
}
