//! Monitor loop: ticks every strategy at a fixed interval and hands the
//! collected alerts off, either to the queue or straight to an inline
//! [`AlertLoop`].

use std::sync::Arc;
use std::time::Duration;

use super::alert_loop::AlertLoop;
use super::config::PipelineConfig;
use super::lifetime::LifetimeHandle;
use super::policy::{run_monitors, FailurePolicy, TickOutcome};
use super::LoopState;
use crate::alerts::{Alert, AlertQueue, QueueError};
use crate::monitor::MonitorStrategy;

/// Where a tick's alerts go
pub enum Dispatch {
    /// Two-loop topology: enqueue for the alert loop
    Queue(Arc<AlertQueue>),
    /// Single-loop topology: deliver before the next tick
    Direct(AlertLoop),
}

enum HandOffError {
    Queue(QueueError),
    Delivery(LoopState),
}

pub struct MonitorLoop {
    strategies: Vec<Box<dyn MonitorStrategy>>,
    policy: FailurePolicy,
    interval: Duration,
    lifetime: LifetimeHandle,
    dispatch: Dispatch,
    state: LoopState,
    ticks: u64,
}

impl MonitorLoop {
    pub fn new(
        strategies: Vec<Box<dyn MonitorStrategy>>,
        config: &PipelineConfig,
        lifetime: LifetimeHandle,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            strategies,
            policy: config.monitoring_policy(),
            interval: config.monitor_interval,
            lifetime,
            dispatch,
            state: LoopState::Idle,
            ticks: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// State of the inline alert loop, if this loop owns one
    pub fn delivery_state(&self) -> Option<LoopState> {
        match &self.dispatch {
            Dispatch::Direct(alert_loop) => Some(alert_loop.state()),
            Dispatch::Queue(_) => None,
        }
    }

    fn transition(&mut self, next: LoopState) {
        tracing::debug!(from = ?self.state, to = ?next, "Monitor loop state change");
        self.state = next;
    }

    fn terminate(&mut self) -> LoopState {
        if !self.state.is_final() {
            tracing::info!(ticks = self.ticks, "Monitor loop stopped");
            self.transition(LoopState::Terminated);
        }
        self.state
    }

    fn abort(&mut self, reason: String) -> LoopState {
        tracing::error!(reason = %reason, "Monitor loop aborting");
        self.lifetime.request_shutdown(reason);
        self.transition(LoopState::Aborted);
        LoopState::Aborted
    }

    /// Adopt the final state of the inline alert loop. It has already
    /// requested shutdown if it aborted.
    fn follow_delivery(&mut self, state: LoopState) -> LoopState {
        match state {
            LoopState::Aborted => {
                self.transition(LoopState::Aborted);
                LoopState::Aborted
            }
            _ => self.terminate(),
        }
    }

    async fn setup(&mut self) -> Result<(), LoopState> {
        self.transition(LoopState::Setup);

        if let Dispatch::Direct(alert_loop) = &mut self.dispatch {
            if let Err(state) = alert_loop.setup().await {
                return Err(self.follow_delivery(state));
            }
        }

        let cancel = self.lifetime.token().clone();
        for index in 0..self.strategies.len() {
            let result = self.strategies[index].setup(&cancel).await;
            if let Err(e) = result {
                if cancel.is_cancelled() {
                    return Err(self.terminate());
                }
                let name = self.strategies[index].name().to_string();
                return Err(self.abort(format!("Monitor {} failed to set up: {}", name, e)));
            }
        }

        tracing::info!(
            monitors = self.strategies.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Monitor loop ready"
        );
        self.transition(LoopState::Ticking);
        Ok(())
    }

    async fn hand_off(&mut self, alerts: Vec<Alert>) -> Result<(), LoopState> {
        if alerts.is_empty() {
            return Ok(());
        }

        let cancel = self.lifetime.token().clone();
        let count = alerts.len();

        let result = match &mut self.dispatch {
            Dispatch::Queue(queue) => {
                let mut result = Ok(());
                for alert in alerts {
                    if let Err(e) = queue.enqueue(alert, &cancel).await {
                        result = Err(HandOffError::Queue(e));
                        break;
                    }
                }
                result
            }
            Dispatch::Direct(alert_loop) => alert_loop
                .deliver_batch(alerts)
                .await
                .map_err(HandOffError::Delivery),
        };

        match result {
            Ok(()) => {
                tracing::debug!(alerts = count, "Alerts handed off");
                Ok(())
            }
            Err(HandOffError::Queue(QueueError::Cancelled)) => Err(self.terminate()),
            Err(HandOffError::Queue(e)) => Err(self.abort(format!("Failed to hand off alert: {}", e))),
            Err(HandOffError::Delivery(state)) => Err(self.follow_delivery(state)),
        }
    }

    /// Run until cancelled or aborted. Returns the final state.
    pub async fn run(&mut self) -> LoopState {
        if let Err(state) = self.setup().await {
            return state;
        }

        let cancel = self.lifetime.token().clone();

        loop {
            if cancel.is_cancelled() {
                return self.terminate();
            }

            self.ticks += 1;
            match run_monitors(&mut self.strategies, self.policy, &cancel).await {
                TickOutcome::Alerts(alerts) => {
                    if let Err(state) = self.hand_off(alerts).await {
                        return state;
                    }
                }
                TickOutcome::Failed { strategy } => {
                    return self.abort(format!("Monitor {} failed", strategy));
                }
                TickOutcome::Cancelled => return self.terminate(),
            }

            tokio::select! {
                _ = cancel.cancelled() => return self.terminate(),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{alert, DeliveryLog, RecordingDelivery, ScriptedMonitor};

    fn config(allow_monitoring_failure: bool) -> PipelineConfig {
        PipelineConfig {
            monitor_interval: Duration::from_millis(5),
            alert_throttle: Duration::from_millis(1),
            allow_monitoring_failure,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_failure_aborts_without_enqueueing_partial_tick() {
        let lifetime = LifetimeHandle::new();
        let queue = Arc::new(AlertQueue::new(8).unwrap());
        let mut monitor_loop = MonitorLoop::new(
            vec![
                Box::new(ScriptedMonitor::new("stock", vec![Some(vec![alert(1)])])),
                Box::new(ScriptedMonitor::new("relay", vec![None])),
            ],
            &config(false),
            lifetime.clone(),
            Dispatch::Queue(Arc::clone(&queue)),
        );

        assert_eq!(monitor_loop.run().await, LoopState::Aborted);
        assert!(queue.is_empty());
        assert_eq!(lifetime.shutdown_requests(), 1);
        assert_eq!(monitor_loop.ticks(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_skipped_when_allowed() {
        let lifetime = LifetimeHandle::new();
        let queue = Arc::new(AlertQueue::new(8).unwrap());
        let mut monitor_loop = MonitorLoop::new(
            vec![
                Box::new(ScriptedMonitor::new("stock", vec![Some(vec![alert(1)])])),
                Box::new(ScriptedMonitor::new("relay", vec![None])),
                Box::new(ScriptedMonitor::new("other", vec![Some(vec![alert(2), alert(3)])])),
            ],
            &config(true),
            lifetime.clone(),
            Dispatch::Queue(Arc::clone(&queue)),
        );
        let task = tokio::spawn(async move { monitor_loop.run().await });

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(queue.dequeue(lifetime.token()).await.unwrap());
        }
        lifetime.cancel();

        assert_eq!(task.await.unwrap(), LoopState::Terminated);
        assert_eq!(received, vec![alert(1), alert(2), alert(3)]);
        assert_eq!(lifetime.shutdown_requests(), 0);
    }

    #[tokio::test]
    async fn test_setup_failure_aborts() {
        let lifetime = LifetimeHandle::new();
        let queue = Arc::new(AlertQueue::new(8).unwrap());
        let ticking = ScriptedMonitor::new("stock", vec![]);
        let calls = ticking.calls();
        let mut monitor_loop = MonitorLoop::new(
            vec![Box::new(ScriptedMonitor::failing_setup("relay")), Box::new(ticking)],
            &config(true),
            lifetime.clone(),
            Dispatch::Queue(queue),
        );

        assert_eq!(monitor_loop.run().await, LoopState::Aborted);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(lifetime.abort_reason().unwrap().contains("relay"));
    }

    #[tokio::test]
    async fn test_cancel_before_start_terminates() {
        let lifetime = LifetimeHandle::new();
        lifetime.cancel();
        let mut monitor_loop = MonitorLoop::new(
            vec![Box::new(ScriptedMonitor::new("stock", vec![]))],
            &config(false),
            lifetime.clone(),
            Dispatch::Queue(Arc::new(AlertQueue::new(1).unwrap())),
        );

        assert_eq!(monitor_loop.run().await, LoopState::Terminated);
        assert_eq!(monitor_loop.ticks(), 0);
        assert!(!lifetime.is_aborted());
    }

    #[tokio::test]
    async fn test_direct_dispatch_delivers_before_next_tick() {
        let log = DeliveryLog::default();
        let lifetime = LifetimeHandle::new();
        let alert_loop = AlertLoop::new(
            vec![Box::new(RecordingDelivery::new("console", log.clone()))],
            &config(false),
            lifetime.clone(),
        );
        let mut monitor_loop = MonitorLoop::new(
            vec![Box::new(ScriptedMonitor::new(
                "stock",
                vec![Some(vec![alert(1), alert(2)]), Some(vec![alert(3)])],
            ))],
            &config(false),
            lifetime.clone(),
            Dispatch::Direct(alert_loop),
        );
        let task = tokio::spawn(async move {
            let state = monitor_loop.run().await;
            (state, monitor_loop.delivery_state())
        });

        log.wait_for(3).await;
        lifetime.cancel();

        let (state, delivery_state) = task.await.unwrap();
        assert_eq!(state, LoopState::Terminated);
        assert!(delivery_state.is_some());
        assert_eq!(log.alerts_for("console"), vec![alert(1), alert(2), alert(3)]);
    }

    #[tokio::test]
    async fn test_direct_dispatch_delivery_abort_stops_monitoring() {
        let log = DeliveryLog::default();
        let lifetime = LifetimeHandle::new();
        let alert_loop = AlertLoop::new(
            vec![Box::new(RecordingDelivery::failing("broken", log.clone()))],
            &config(false),
            lifetime.clone(),
        );
        let mut monitor_loop = MonitorLoop::new(
            vec![Box::new(ScriptedMonitor::new("stock", vec![Some(vec![alert(1), alert(2)])]))],
            &config(false),
            lifetime.clone(),
            Dispatch::Direct(alert_loop),
        );

        assert_eq!(monitor_loop.run().await, LoopState::Aborted);
        assert_eq!(monitor_loop.delivery_state(), Some(LoopState::Aborted));
        assert_eq!(log.len(), 1);
        assert_eq!(lifetime.shutdown_requests(), 1);
    }
}
