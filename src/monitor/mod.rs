//! Monitoring strategies
//!
//! A monitoring strategy turns one fresh observation per tick into zero or
//! more alerts. Returning `None` reports a failed tick; the pipeline's
//! failure policy decides whether that skips the strategy or aborts.

pub mod relay;
pub mod stock;

pub use relay::{RelayMonitor, RELAY_ALERT_TOPIC};
pub use stock::{Recommendation, StockMonitor, StockMonitorConfig, StockRules, Watermark};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::alerts::Alert;
use crate::error::SetupError;

/// Produces alerts from observations
#[async_trait]
pub trait MonitorStrategy: Send {
    /// Name used in logs and abort messages
    fn name(&self) -> &str;

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError>;

    /// Run one tick. `None` signals failure, `Some(vec![])` a quiet tick.
    async fn monitor(&mut self) -> Option<Vec<Alert>>;
}
