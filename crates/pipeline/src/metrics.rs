//! Substrate counters
//!
//! Relaxed atomic counters shared by every actor of one pipeline.
//! Eventually consistent, not real-time; cheap enough for the hot path.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one pipeline's substrate activity
///
/// All methods are safe to call concurrently from any actor.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Items enqueued at vnodes (inject + emissions)
    items_queued: AtomicU64,

    /// Items handed to workers
    items_dispatched: AtomicU64,

    /// Items a fitting's `process` completed
    items_processed: AtomicU64,

    /// Outputs emitted by fittings (`process` and `done`)
    items_emitted: AtomicU64,

    /// Workers spawned by vnodes
    workers_spawned: AtomicU64,

    /// Workers that reported done
    workers_done: AtomicU64,

    /// Workers whose liveness monitor fired
    workers_vanished: AtomicU64,

    /// EOI broadcasts from controls to vnodes
    eoi_broadcasts: AtomicU64,

    /// EOI forwards to the next stage or the sink
    eoi_forwards: AtomicU64,

    /// Completed partition handoffs
    handoffs: AtomicU64,
}

impl PipelineMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            items_queued: AtomicU64::new(0),
            items_dispatched: AtomicU64::new(0),
            items_processed: AtomicU64::new(0),
            items_emitted: AtomicU64::new(0),
            workers_spawned: AtomicU64::new(0),
            workers_done: AtomicU64::new(0),
            workers_vanished: AtomicU64::new(0),
            eoi_broadcasts: AtomicU64::new(0),
            eoi_forwards: AtomicU64::new(0),
            handoffs: AtomicU64::new(0),
        }
    }

    /// Record an item enqueued at a vnode
    #[inline]
    pub fn record_queued(&self) {
        self.items_queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an item handed to a worker
    #[inline]
    pub fn record_dispatched(&self) {
        self.items_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed `process` callback
    #[inline]
    pub fn record_processed(&self) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an emitted output
    #[inline]
    pub fn record_emitted(&self) {
        self.items_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a worker spawn
    #[inline]
    pub fn record_worker_spawned(&self) {
        self.workers_spawned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a worker reporting done
    #[inline]
    pub fn record_worker_done(&self) {
        self.workers_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a worker disappearing without done
    #[inline]
    pub fn record_worker_vanished(&self) {
        self.workers_vanished.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an EOI broadcast to a vnode
    #[inline]
    pub fn record_eoi_broadcast(&self) {
        self.eoi_broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an EOI forward downstream
    #[inline]
    pub fn record_eoi_forwarded(&self) {
        self.eoi_forwards.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed handoff
    #[inline]
    pub fn record_handoff(&self) {
        self.handoffs.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_queued: self.items_queued.load(Ordering::Relaxed),
            items_dispatched: self.items_dispatched.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            items_emitted: self.items_emitted.load(Ordering::Relaxed),
            workers_spawned: self.workers_spawned.load(Ordering::Relaxed),
            workers_done: self.workers_done.load(Ordering::Relaxed),
            workers_vanished: self.workers_vanished.load(Ordering::Relaxed),
            eoi_broadcasts: self.eoi_broadcasts.load(Ordering::Relaxed),
            eoi_forwards: self.eoi_forwards.load(Ordering::Relaxed),
            handoffs: self.handoffs.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub items_queued: u64,
    pub items_dispatched: u64,
    pub items_processed: u64,
    pub items_emitted: u64,
    pub workers_spawned: u64,
    pub workers_done: u64,
    pub workers_vanished: u64,
    pub eoi_broadcasts: u64,
    pub eoi_forwards: u64,
    pub handoffs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = PipelineMetrics::new();

        metrics.record_queued();
        metrics.record_queued();
        metrics.record_dispatched();
        metrics.record_processed();
        metrics.record_emitted();
        metrics.record_worker_spawned();
        metrics.record_worker_done();
        metrics.record_eoi_broadcast();
        metrics.record_eoi_forwarded();
        metrics.record_handoff();

        let s = metrics.snapshot();
        assert_eq!(s.items_queued, 2);
        assert_eq!(s.items_dispatched, 1);
        assert_eq!(s.items_processed, 1);
        assert_eq!(s.items_emitted, 1);
        assert_eq!(s.workers_spawned, 1);
        assert_eq!(s.workers_done, 1);
        assert_eq!(s.workers_vanished, 0);
        assert_eq!(s.eoi_broadcasts, 1);
        assert_eq!(s.eoi_forwards, 1);
        assert_eq!(s.handoffs, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(PipelineMetrics::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let m = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    m.record_queued();
                    m.record_processed();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let s = metrics.snapshot();
        assert_eq!(s.items_queued, 4000);
        assert_eq!(s.items_processed, 4000);
    }
}
