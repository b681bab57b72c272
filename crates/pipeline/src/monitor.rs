//! Worker liveness monitors
//!
//! A control must learn when one of its workers disappears without saying
//! done. The primitive here is deliberately narrow: monitor a worker, get
//! at most one down notification, cancel idempotently.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Worker identifier, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker:{}", self.0)
    }
}

/// Identity of one worker, usable as a liveness-monitor target
///
/// Equality and hashing go by id only; the termination token rides along
/// so monitors can observe the worker's exit. The token is cancelled on
/// every exit path, normal or not, via the guard the worker task holds.
#[derive(Clone)]
pub struct WorkerRef {
    id: WorkerId,
    term: CancellationToken,
}

impl WorkerRef {
    /// Mint a fresh worker identity
    pub fn new() -> Self {
        Self {
            id: WorkerId::next(),
            term: CancellationToken::new(),
        }
    }

    /// This worker's id
    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Guard that marks the worker terminated when dropped
    ///
    /// The worker task holds this for its whole life so that panics and
    /// early returns still trip the monitors.
    pub(crate) fn term_guard(&self) -> DropGuard {
        self.term.clone().drop_guard()
    }

    /// Whether the worker has terminated
    #[cfg(test)]
    pub(crate) fn is_terminated(&self) -> bool {
        self.term.is_cancelled()
    }
}

impl Default for WorkerRef {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for WorkerRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorkerRef {}

impl std::hash::Hash for WorkerRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for WorkerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRef").field("id", &self.id).finish()
    }
}

/// Cancellation handle for an installed monitor
///
/// Cancelling is idempotent; dropping the token also cancels, so removing
/// a roster entry tears its monitor down without extra bookkeeping.
#[derive(Debug)]
pub(crate) struct MonitorToken {
    cancel: CancellationToken,
}

impl MonitorToken {
    /// Stop the monitor; no notification fires after this returns
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for MonitorToken {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Install a one-shot liveness monitor on a worker
///
/// If the worker terminates before the monitor is cancelled, exactly one
/// message built by `on_down` is sent to `tx`. A monitor on an
/// already-terminated worker fires immediately.
pub(crate) fn monitor<T, F>(worker: &WorkerRef, tx: mpsc::UnboundedSender<T>, on_down: F) -> MonitorToken
where
    T: Send + 'static,
    F: FnOnce(WorkerRef) -> T + Send + 'static,
{
    let cancel = CancellationToken::new();
    let cancelled = cancel.clone();
    let term = worker.term.clone();
    let target = worker.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = cancelled.cancelled() => {}
            _ = term.cancelled() => {
                let _ = tx.send(on_down(target));
            }
        }
    });

    MonitorToken { cancel }
}
