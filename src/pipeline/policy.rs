//! Failure policy for ordered strategy lists
//!
//! Both loops walk their strategies strictly in registration order. A failed
//! strategy is either skipped or ends the walk, depending on the policy.
//! Nothing a strategy does can unwind past these functions; the caller only
//! sees an outcome.

use tokio_util::sync::CancellationToken;

use crate::alerts::Alert;
use crate::delivery::DeliveryStrategy;
use crate::monitor::MonitorStrategy;

/// What to do when one strategy fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and continue with the next strategy
    Skip,
    /// Stop the walk and abort the pipeline
    Abort,
}

impl FailurePolicy {
    pub fn from_allow(allow_failure: bool) -> Self {
        if allow_failure {
            FailurePolicy::Skip
        } else {
            FailurePolicy::Abort
        }
    }
}

/// Result of one monitoring tick
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Alerts of every successful strategy, in registration order
    Alerts(Vec<Alert>),
    /// A strategy failed under [`FailurePolicy::Abort`]; nothing collected
    /// this tick survives
    Failed { strategy: String },
    /// A strategy failed after cancellation was requested
    Cancelled,
}

/// Result of delivering one alert
#[derive(Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every channel ran; `skipped` of them failed under [`FailurePolicy::Skip`]
    Delivered { skipped: usize },
    Failed { strategy: String },
    Cancelled,
}

/// Run every monitor once, in order
pub async fn run_monitors(
    strategies: &mut [Box<dyn MonitorStrategy>],
    policy: FailurePolicy,
    cancel: &CancellationToken,
) -> TickOutcome {
    let mut batch = Vec::new();

    for strategy in strategies.iter_mut() {
        match strategy.monitor().await {
            Some(alerts) => {
                tracing::debug!(
                    strategy = %strategy.name(),
                    alerts = alerts.len(),
                    "Monitoring succeeded"
                );
                batch.extend(alerts);
            }
            None if cancel.is_cancelled() => return TickOutcome::Cancelled,
            None => match policy {
                FailurePolicy::Skip => {
                    tracing::warn!(strategy = %strategy.name(), "Monitoring failed, skipping");
                }
                FailurePolicy::Abort => {
                    return TickOutcome::Failed {
                        strategy: strategy.name().to_string(),
                    };
                }
            },
        }
    }

    TickOutcome::Alerts(batch)
}

/// Send one alert through every channel, in order
pub async fn run_deliveries(
    strategies: &mut [Box<dyn DeliveryStrategy>],
    alert: &Alert,
    policy: FailurePolicy,
    cancel: &CancellationToken,
) -> DeliveryOutcome {
    let mut skipped = 0;

    for strategy in strategies.iter_mut() {
        tracing::debug!(strategy = %strategy.name(), topic = %alert.topic(), "Delivering alert");

        if strategy.send(alert).await {
            continue;
        }
        if cancel.is_cancelled() {
            return DeliveryOutcome::Cancelled;
        }

        match policy {
            FailurePolicy::Skip => {
                tracing::warn!(strategy = %strategy.name(), "Delivery failed, skipping");
                skipped += 1;
            }
            FailurePolicy::Abort => {
                return DeliveryOutcome::Failed {
                    strategy: strategy.name().to_string(),
                };
            }
        }
    }

    DeliveryOutcome::Delivered { skipped }
}
