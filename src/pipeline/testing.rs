//! Scripted strategies shared by the pipeline tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::alerts::Alert;
use crate::delivery::DeliveryStrategy;
use crate::error::SetupError;
use crate::monitor::MonitorStrategy;

pub fn alert(n: usize) -> Alert {
    Alert::new(format!("topic-{}", n), format!("message-{}", n))
}

/// Replays a fixed list of tick results, then reports quiet ticks
pub struct ScriptedMonitor {
    name: String,
    script: VecDeque<Option<Vec<Alert>>>,
    calls: Arc<AtomicUsize>,
    fail_setup: bool,
    panic_on_tick: bool,
}

impl ScriptedMonitor {
    pub fn new(name: &str, script: Vec<Option<Vec<Alert>>>) -> Self {
        Self {
            name: name.to_string(),
            script: script.into(),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_setup: false,
            panic_on_tick: false,
        }
    }

    pub fn failing_setup(name: &str) -> Self {
        Self {
            fail_setup: true,
            ..Self::new(name, vec![])
        }
    }

    pub fn panicking(name: &str) -> Self {
        Self {
            panic_on_tick: true,
            ..Self::new(name, vec![])
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl MonitorStrategy for ScriptedMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&mut self, _cancel: &CancellationToken) -> Result<(), SetupError> {
        if self.fail_setup {
            return Err(SetupError::Transport("broker unreachable".to_string()));
        }
        Ok(())
    }

    async fn monitor(&mut self) -> Option<Vec<Alert>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_tick {
            panic!("scripted monitor panic");
        }
        self.script.pop_front().unwrap_or_else(|| Some(vec![]))
    }
}

/// Shared, ordered record of `(channel, alert)` sends
#[derive(Clone, Default)]
pub struct DeliveryLog {
    entries: Arc<Mutex<Vec<(String, Alert)>>>,
}

impl DeliveryLog {
    pub fn entries(&self) -> Vec<(String, Alert)> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Alerts sent through `channel`, in order
    pub fn alerts_for(&self, channel: &str) -> Vec<Alert> {
        self.entries
            .lock()
            .iter()
            .filter(|(name, _)| name == channel)
            .map(|(_, alert)| alert.clone())
            .collect()
    }

    /// Poll until at least `count` sends were recorded
    pub async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.len() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for deliveries");
    }
}

/// Records every send and answers with a fixed result
pub struct RecordingDelivery {
    name: String,
    succeed: bool,
    panic_on_send: bool,
    log: DeliveryLog,
}

impl RecordingDelivery {
    pub fn new(name: &str, log: DeliveryLog) -> Self {
        Self {
            name: name.to_string(),
            succeed: true,
            panic_on_send: false,
            log,
        }
    }

    pub fn failing(name: &str, log: DeliveryLog) -> Self {
        Self {
            succeed: false,
            ..Self::new(name, log)
        }
    }

    pub fn panicking(name: &str, log: DeliveryLog) -> Self {
        Self {
            panic_on_send: true,
            ..Self::new(name, log)
        }
    }
}

#[async_trait]
impl DeliveryStrategy for RecordingDelivery {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&mut self, _cancel: &CancellationToken) -> Result<(), SetupError> {
        Ok(())
    }

    async fn send(&mut self, alert: &Alert) -> bool {
        self.log.entries.lock().push((self.name.clone(), alert.clone()));
        if self.panic_on_send {
            panic!("scripted delivery panic");
        }
        self.succeed
    }
}
