//! Process lifetime handle
//!
//! One cancellation token shared by every loop, plus an idempotent
//! `request_shutdown` used when a loop has to abort. A plain `cancel` is a
//! cooperative stop and is not recorded as an abort.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

struct Inner {
    token: CancellationToken,
    aborted: AtomicBool,
    requests: AtomicUsize,
    reason: Mutex<Option<String>>,
}

/// Cloneable handle shared by the pipeline loops and the binary
#[derive(Clone)]
pub struct LifetimeHandle {
    inner: Arc<Inner>,
}

impl LifetimeHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: CancellationToken::new(),
                aborted: AtomicBool::new(false),
                requests: AtomicUsize::new(0),
                reason: Mutex::new(None),
            }),
        }
    }

    /// Token honored by every blocking wait in the pipeline
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// Cooperative stop (Ctrl-C, tests). Not an abort.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Wait until the pipeline is asked to stop for any reason
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Ask the whole process to shut down because of a fatal failure.
    ///
    /// Safe to call from several loops at once; only the first call records
    /// its reason and returns `true`.
    pub fn request_shutdown(&self, reason: impl Into<String>) -> bool {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);

        if self.inner.aborted.swap(true, Ordering::SeqCst) {
            return false;
        }

        let reason = reason.into();
        tracing::warn!(reason = %reason, "Shutdown requested");
        *self.inner.reason.lock() = Some(reason);
        self.inner.token.cancel();
        true
    }

    /// Whether any loop requested an abort
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Number of `request_shutdown` calls, including repeats
    pub fn shutdown_requests(&self) -> usize {
        self.inner.requests.load(Ordering::SeqCst)
    }

    /// Reason given by the first shutdown request
    pub fn abort_reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }
}

impl Default for LifetimeHandle {
    fn default() -> Self {
        Self::new()
    }
}
