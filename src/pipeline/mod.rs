//! Monitor/alert pipeline
//!
//! Two topologies share the same loops:
//!
//! - two-loop: a monitor task and an alert task joined by a bounded
//!   [`AlertQueue`]. A full queue blocks the monitor loop.
//! - single-loop: one task that delivers each tick's alerts before sleeping.
//!
//! Any loop that aborts calls [`LifetimeHandle::request_shutdown`], which
//! cancels the shared token and stops every other loop at its next wait.

pub mod alert_loop;
pub mod config;
pub mod lifetime;
pub mod monitor_loop;
pub mod policy;

#[cfg(test)]
pub(crate) mod testing;

pub use alert_loop::AlertLoop;
pub use config::{PipelineConfig, Topology};
pub use lifetime::LifetimeHandle;
pub use monitor_loop::{Dispatch, MonitorLoop};
pub use policy::{DeliveryOutcome, FailurePolicy, TickOutcome};

use std::sync::Arc;

use tokio::task::JoinError;

use crate::alerts::{AlertQueue, QueueError};
use crate::config::ConfigError;
use crate::delivery::DeliveryStrategy;
use crate::monitor::MonitorStrategy;

/// Loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Setup,
    /// Monitor loop running
    Ticking,
    /// Alert loop running
    Delivering,
    /// Stopped by cancellation or end of input
    Terminated,
    /// Stopped by a fatal failure; shutdown was requested
    Aborted,
}

impl LoopState {
    pub fn is_final(&self) -> bool {
        matches!(self, LoopState::Terminated | LoopState::Aborted)
    }
}

/// Final states after a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub topology: Topology,
    pub monitor: LoopState,
    pub alert: LoopState,
    /// First abort reason, if any loop aborted
    pub abort_reason: Option<String>,
}

impl PipelineReport {
    pub fn is_aborted(&self) -> bool {
        self.abort_reason.is_some()
    }
}

/// Pipeline errors raised before any loop starts
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid pipeline configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Owns the strategy lists until [`Pipeline::run`] hands them to the loops
pub struct Pipeline {
    config: PipelineConfig,
    monitors: Vec<Box<dyn MonitorStrategy>>,
    channels: Vec<Box<dyn DeliveryStrategy>>,
    lifetime: LifetimeHandle,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        monitors: Vec<Box<dyn MonitorStrategy>>,
        channels: Vec<Box<dyn DeliveryStrategy>>,
        lifetime: LifetimeHandle,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            monitors,
            channels,
            lifetime,
        })
    }

    /// Run until cancelled or aborted
    pub async fn run(self) -> Result<PipelineReport, PipelineError> {
        let Pipeline {
            config,
            monitors,
            channels,
            lifetime,
        } = self;

        tracing::info!(
            topology = %config.topology,
            monitors = monitors.len(),
            channels = channels.len(),
            "Starting pipeline"
        );

        let (monitor, alert) = match config.topology {
            Topology::TwoLoop => {
                let queue = Arc::new(AlertQueue::new(config.queue_capacity)?);
                let mut alert_loop = AlertLoop::new(channels, &config, lifetime.clone());
                let mut monitor_loop = MonitorLoop::new(
                    monitors,
                    &config,
                    lifetime.clone(),
                    Dispatch::Queue(Arc::clone(&queue)),
                );

                let mut alert_task = tokio::spawn({
                    let queue = Arc::clone(&queue);
                    async move { alert_loop.run(&queue).await }
                });
                let mut monitor_task = tokio::spawn(async move { monitor_loop.run().await });

                // Settle whichever loop ends first so a panic cancels the other
                tokio::select! {
                    result = &mut monitor_task => {
                        let monitor = settle(result, &lifetime, "monitor");
                        // No producer is left once the monitor loop is gone
                        queue.close();
                        (monitor, settle(alert_task.await, &lifetime, "alert"))
                    }
                    result = &mut alert_task => {
                        let alert = settle(result, &lifetime, "alert");
                        let monitor = settle(monitor_task.await, &lifetime, "monitor");
                        queue.close();
                        (monitor, alert)
                    }
                }
            }
            Topology::SingleLoop => {
                let alert_loop = AlertLoop::new(channels, &config, lifetime.clone());
                let mut monitor_loop =
                    MonitorLoop::new(monitors, &config, lifetime.clone(), Dispatch::Direct(alert_loop));

                let task = tokio::spawn(async move {
                    let state = monitor_loop.run().await;
                    (state, monitor_loop.delivery_state())
                });

                match task.await {
                    Ok((monitor, alert)) => (monitor, alert.unwrap_or(monitor)),
                    Err(e) => {
                        let state = settle(Err(e), &lifetime, "monitor");
                        (state, state)
                    }
                }
            }
        };

        let report = PipelineReport {
            topology: config.topology,
            monitor,
            alert,
            abort_reason: lifetime.abort_reason(),
        };

        match &report.abort_reason {
            Some(reason) => tracing::error!(reason = %reason, "Pipeline aborted"),
            None => tracing::info!("Pipeline stopped"),
        }

        Ok(report)
    }
}

/// Map a loop task's join result to its final state. A panicked loop counts
/// as an abort.
fn settle(result: Result<LoopState, JoinError>, lifetime: &LifetimeHandle, name: &str) -> LoopState {
    match result {
        Ok(state) => state,
        Err(e) if e.is_panic() => {
            tracing::error!(task = name, "Loop task panicked");
            lifetime.request_shutdown(format!("{} loop panicked", name));
            LoopState::Aborted
        }
        Err(_) => LoopState::Terminated,
    }
}
