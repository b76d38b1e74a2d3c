//! Bounded hand-off queue between the monitor loop and the alert loop
//!
//! Backed by a tokio bounded mpsc channel. The producer side suspends while
//! the queue is full and the consumer side suspends while it is empty. Both
//! sides also wake on cancellation and on [`AlertQueue::close`].
//!
//! Closing wins over pending items: once closed, the consumer stops even if
//! alerts are still buffered, so nothing is delivered after shutdown.

use futures::stream::{self, Stream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::alert::Alert;

/// Fixed-capacity FIFO of alerts
pub struct AlertQueue {
    sender: mpsc::Sender<Alert>,
    receiver: Mutex<mpsc::Receiver<Alert>>,
    closed: CancellationToken,
    capacity: usize,
}

impl AlertQueue {
    /// Create a queue holding at most `capacity` alerts
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }

        let (sender, receiver) = mpsc::channel(capacity);
        Ok(Self {
            sender,
            receiver: Mutex::new(receiver),
            closed: CancellationToken::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of alerts currently buffered
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push an alert, waiting for a free slot while the queue is full
    pub async fn enqueue(&self, alert: Alert, cancel: &CancellationToken) -> Result<(), QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(QueueError::Closed),
            _ = cancel.cancelled() => Err(QueueError::Cancelled),
            sent = self.sender.send(alert) => sent.map_err(|_| QueueError::Closed),
        }
    }

    /// Pop the oldest alert, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed or `cancel` fires.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Option<Alert> {
        let mut receiver = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return None,
            _ = cancel.cancelled() => return None,
            guard = self.receiver.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            _ = cancel.cancelled() => None,
            alert = receiver.recv() => alert,
        }
    }

    /// Lazily yield alerts in FIFO order until the queue is closed or
    /// `cancel` fires. Each call starts a fresh stream over the same buffer.
    pub fn dequeue_all<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> impl Stream<Item = Alert> + 'a {
        stream::unfold((), move |()| async move {
            self.dequeue(cancel).await.map(|alert| (alert, ()))
        })
    }

    /// Close the queue. Pending and future producers fail, the consumer
    /// stream ends. Idempotent.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            tracing::debug!(pending = self.len(), "Alert queue closed");
        }
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

/// Queue errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue capacity must be at least 1")]
    InvalidCapacity,

    #[error("Queue is closed")]
    Closed,

    #[error("Enqueue cancelled")]
    Cancelled,
}
