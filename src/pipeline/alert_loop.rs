//! Alert loop: drains the queue and fans each alert out to every channel

use std::time::Duration;

use futures::StreamExt;

use super::config::PipelineConfig;
use super::lifetime::LifetimeHandle;
use super::policy::{run_deliveries, DeliveryOutcome, FailurePolicy};
use super::LoopState;
use crate::alerts::{Alert, AlertQueue};
use crate::delivery::DeliveryStrategy;

/// Delivers alerts through an ordered list of channels.
///
/// Runs standalone against an [`AlertQueue`] in the two-loop topology, or is
/// driven inline by the monitor loop in the single-loop topology.
pub struct AlertLoop {
    strategies: Vec<Box<dyn DeliveryStrategy>>,
    policy: FailurePolicy,
    throttle: Duration,
    lifetime: LifetimeHandle,
    state: LoopState,
    delivered: u64,
}

impl AlertLoop {
    pub fn new(
        strategies: Vec<Box<dyn DeliveryStrategy>>,
        config: &PipelineConfig,
        lifetime: LifetimeHandle,
    ) -> Self {
        Self {
            strategies,
            policy: config.alerting_policy(),
            throttle: config.alert_throttle,
            lifetime,
            state: LoopState::Idle,
            delivered: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Alerts that went through the full channel list
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn transition(&mut self, next: LoopState) {
        tracing::debug!(from = ?self.state, to = ?next, "Alert loop state change");
        self.state = next;
    }

    fn terminate(&mut self) -> LoopState {
        if !self.state.is_final() {
            tracing::info!(delivered = self.delivered, "Alert loop stopped");
            self.transition(LoopState::Terminated);
        }
        self.state
    }

    fn abort(&mut self, reason: String) -> LoopState {
        tracing::error!(reason = %reason, "Alert loop aborting");
        self.lifetime.request_shutdown(reason);
        self.transition(LoopState::Aborted);
        LoopState::Aborted
    }

    /// Set up every channel in order. Any setup error aborts.
    pub async fn setup(&mut self) -> Result<(), LoopState> {
        self.transition(LoopState::Setup);
        let cancel = self.lifetime.token().clone();

        for index in 0..self.strategies.len() {
            let result = self.strategies[index].setup(&cancel).await;
            if let Err(e) = result {
                if cancel.is_cancelled() {
                    return Err(self.terminate());
                }
                let name = self.strategies[index].name().to_string();
                return Err(self.abort(format!("Delivery channel {} failed to set up: {}", name, e)));
            }
        }

        tracing::info!(channels = self.strategies.len(), "Alert loop ready");
        self.transition(LoopState::Delivering);
        Ok(())
    }

    /// Deliver one alert through every channel, then throttle
    pub async fn deliver(&mut self, alert: &Alert) -> Result<(), LoopState> {
        let cancel = self.lifetime.token().clone();

        match run_deliveries(&mut self.strategies, alert, self.policy, &cancel).await {
            DeliveryOutcome::Delivered { skipped } => {
                self.delivered += 1;
                tracing::debug!(topic = %alert.topic(), skipped = skipped, "Alert delivered");
            }
            DeliveryOutcome::Failed { strategy } => {
                return Err(self.abort(format!("Delivery via {} failed", strategy)));
            }
            DeliveryOutcome::Cancelled => return Err(self.terminate()),
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(self.terminate()),
            _ = tokio::time::sleep(self.throttle) => Ok(()),
        }
    }

    /// Deliver a tick's alerts in order
    pub async fn deliver_batch(&mut self, alerts: Vec<Alert>) -> Result<(), LoopState> {
        for alert in &alerts {
            self.deliver(alert).await?;
        }
        Ok(())
    }

    /// Setup, then deliver until the queue closes or the lifetime ends
    pub async fn run(&mut self, queue: &AlertQueue) -> LoopState {
        if let Err(state) = self.setup().await {
            return state;
        }

        let cancel = self.lifetime.token().clone();
        let mut alerts = Box::pin(queue.dequeue_all(&cancel));

        while let Some(alert) = alerts.next().await {
            if let Err(state) = self.deliver(&alert).await {
                return state;
            }
        }

        self.terminate()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::testing::{alert, DeliveryLog, RecordingDelivery};

    fn config(allow_alerting_failure: bool) -> PipelineConfig {
        PipelineConfig {
            alert_throttle: Duration::from_millis(1),
            allow_alerting_failure,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_always_failing_channel_aborts_on_first_alert() {
        let log = DeliveryLog::default();
        let lifetime = LifetimeHandle::new();
        let queue = AlertQueue::new(4).unwrap();
        queue.enqueue(alert(1), lifetime.token()).await.unwrap();
        queue.enqueue(alert(2), lifetime.token()).await.unwrap();

        let mut alert_loop = AlertLoop::new(
            vec![
                Box::new(RecordingDelivery::failing("broken", log.clone())),
                Box::new(RecordingDelivery::new("console", log.clone())),
            ],
            &config(false),
            lifetime.clone(),
        );

        assert_eq!(alert_loop.run(&queue).await, LoopState::Aborted);
        assert_eq!(log.entries(), vec![("broken".to_string(), alert(1))]);
        assert_eq!(lifetime.shutdown_requests(), 1);
        assert!(lifetime.is_aborted());
    }

    #[tokio::test]
    async fn test_always_failing_channel_is_skipped_when_allowed() {
        let log = DeliveryLog::default();
        let lifetime = LifetimeHandle::new();
        let queue = Arc::new(AlertQueue::new(4).unwrap());
        queue.enqueue(alert(1), lifetime.token()).await.unwrap();
        queue.enqueue(alert(2), lifetime.token()).await.unwrap();

        let mut alert_loop = AlertLoop::new(
            vec![
                Box::new(RecordingDelivery::failing("broken", log.clone())),
                Box::new(RecordingDelivery::new("console", log.clone())),
            ],
            &config(true),
            lifetime.clone(),
        );
        let task = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { alert_loop.run(&queue).await }
        });

        log.wait_for(4).await;
        lifetime.cancel();

        assert_eq!(task.await.unwrap(), LoopState::Terminated);
        assert_eq!(
            log.entries(),
            vec![
                ("broken".to_string(), alert(1)),
                ("console".to_string(), alert(1)),
                ("broken".to_string(), alert(2)),
                ("console".to_string(), alert(2)),
            ]
        );
        assert_eq!(lifetime.shutdown_requests(), 0);
    }

    #[tokio::test]
    async fn test_closed_queue_terminates_without_delivering() {
        let log = DeliveryLog::default();
        let lifetime = LifetimeHandle::new();
        let queue = AlertQueue::new(4).unwrap();
        queue.enqueue(alert(1), lifetime.token()).await.unwrap();
        queue.close();

        let mut alert_loop = AlertLoop::new(
            vec![Box::new(RecordingDelivery::new("console", log.clone()))],
            &config(false),
            lifetime.clone(),
        );

        assert_eq!(alert_loop.run(&queue).await, LoopState::Terminated);
        assert!(log.entries().is_empty());
        assert!(!lifetime.is_aborted());
    }

    #[tokio::test]
    async fn test_deliver_counts_completed_alerts() {
        let log = DeliveryLog::default();
        let mut alert_loop = AlertLoop::new(
            vec![Box::new(RecordingDelivery::new("console", log.clone()))],
            &config(false),
            LifetimeHandle::new(),
        );

        alert_loop.setup().await.unwrap();
        alert_loop
            .deliver_batch(vec![alert(1), alert(2), alert(3)])
            .await
            .unwrap();

        assert_eq!(alert_loop.delivered(), 3);
        assert_eq!(alert_loop.state(), LoopState::Delivering);
        assert_eq!(log.alerts_for("console"), vec![alert(1), alert(2), alert(3)]);
    }
}
