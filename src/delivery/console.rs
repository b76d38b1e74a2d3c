//! Console delivery

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use super::DeliveryStrategy;
use crate::alerts::Alert;
use crate::error::SetupError;
use crate::sim::LatencyModel;

/// Prints alerts to stdout
pub struct ConsoleDelivery {
    latency: LatencyModel,
    rng: StdRng,
    cancel: CancellationToken,
}

impl ConsoleDelivery {
    pub fn new(latency: LatencyModel) -> Self {
        Self::with_rng(latency, StdRng::from_entropy())
    }

    pub fn with_rng(latency: LatencyModel, rng: StdRng) -> Self {
        Self {
            latency,
            rng,
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for ConsoleDelivery {
    fn default() -> Self {
        Self::new(LatencyModel::default())
    }
}

#[async_trait]
impl DeliveryStrategy for ConsoleDelivery {
    fn name(&self) -> &str {
        "console"
    }

    async fn setup(&mut self, cancel: &CancellationToken) -> Result<(), SetupError> {
        self.latency.validate()?;
        self.cancel = cancel.clone();
        Ok(())
    }

    async fn send(&mut self, alert: &Alert) -> bool {
        let latency = self.latency.sample_latency(&mut self.rng);

        tokio::select! {
            _ = self.cancel.cancelled() => return false,
            _ = tokio::time::sleep(latency) => {}
        }

        if self.latency.roll_failure(&mut self.rng) {
            tracing::warn!(topic = %alert.topic(), "Simulated console delivery failure");
            return false;
        }

        println!("[ALERT] {}\n{}", alert.topic(), alert.message());
        true
    }
}
