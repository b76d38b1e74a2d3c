//! Delivery channels
//!
//! Every channel reports success as a plain `bool`: transport errors are
//! logged inside the channel and never reach the alert loop.
//!
//! - [`ConsoleDelivery`]: stdout, with optional simulated latency/failure
//! - [`SmtpDelivery`]: outbound mail, retried up to a configured count
//! - [`WebhookDelivery`]: one HTTP POST per alert
//! - `KafkaDelivery` (feature `kafka`): one publish per alert

pub mod console;
pub mod smtp;
pub mod webhook;

pub use console::ConsoleDelivery;
pub use smtp::{SmtpConfig, SmtpDelivery};
pub use webhook::{WebhookConfig, WebhookDelivery};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::alerts::Alert;
use crate::error::SetupError;

/// Sends alerts through one channel
#[async_trait]
pub trait DeliveryStrategy: Send {
    /// Name used in logs and abort messages
    fn name(&self) -> &str;

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError>;

    /// Deliver one alert. Never panics or errors; failure is `false`.
    async fn send(&mut self, alert: &Alert) -> bool;
}
