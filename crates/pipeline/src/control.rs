//! Stage control actor
//!
//! One control per stage. It serves stage details to workers as they come
//! up, keeps the authoritative roster of (partition, worker) pairs, and
//! runs the end-of-inputs barrier: EOI moves downstream only after every
//! registered worker has reported done.
//!
//! # States
//!
//! ```text
//! WaitUpstreamEoi ──EOI(roster empty)──────────────▶ forward + terminate
//!       │
//!       └──EOI(workers active)──▶ WaitWorkersDone ──last done──▶ forward + terminate
//! ```
//!
//! Handoff makes the roster churn at awkward moments; the two races that
//! matter are a worker finishing on its old partition before upstream EOI
//! arrives (handled in `WaitUpstreamEoi` by plain removal) and a relocated
//! worker registering after the EOI broadcast (handled in
//! `WaitWorkersDone` by answering its registration with an immediate EOI).

use std::pin::Pin;
use std::sync::Arc;

use plumb_protocol::{FittingSpec, PartitionId, PipelineOptions};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::handle::{ControlId, FittingDetails, FittingHandle, StageOutput, Topology};
use crate::metrics::PipelineMetrics;
use crate::monitor::{monitor, MonitorToken, WorkerRef};
use crate::vnode::VnodeHandle;

/// Requests a control answers, in mailbox order
pub(crate) enum ControlRequest {
    /// Register the worker at `partition` and return the stage details
    GetDetails {
        partition: PartitionId,
        worker: WorkerRef,
        vnode: VnodeHandle,
        reply: oneshot::Sender<FittingDetails>,
    },
    /// Upstream has no further inputs for this stage
    Eoi,
    /// A worker finished (drained or archived away)
    WorkerDone {
        worker: WorkerRef,
        ack: oneshot::Sender<()>,
    },
    /// Copy of the partitions currently in the roster
    Workers {
        reply: oneshot::Sender<Vec<PartitionId>>,
    },
    /// A liveness monitor fired
    Down { worker: WorkerRef },
}

/// One registered worker
struct WorkerEntry {
    partition: PartitionId,
    worker: WorkerRef,
    vnode: VnodeHandle,
    /// Held for the entry's lifetime; dropping it tears the monitor down
    #[allow(dead_code)]
    monitor: MonitorToken,
}

/// The set of workers currently working for a stage
///
/// Small and bounded by partition count, so a plain vector with linear
/// lookups is the right structure.
#[derive(Default)]
struct Roster {
    entries: Vec<WorkerEntry>,
}

impl Roster {
    fn contains(&self, partition: PartitionId, worker: &WorkerRef) -> bool {
        self.entries
            .iter()
            .any(|e| e.partition == partition && &e.worker == worker)
    }

    fn insert(&mut self, entry: WorkerEntry) {
        self.entries.push(entry);
    }

    /// Remove every entry for a worker, returning how many were dropped
    ///
    /// Dropping an entry cancels its monitor.
    fn remove_worker(&mut self, worker: &WorkerRef) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| &e.worker != worker);
        before - self.entries.len()
    }

    fn partitions(&self) -> Vec<PartitionId> {
        self.entries.iter().map(|e| e.partition).collect()
    }

    /// The distinct vnodes hosting this stage's workers
    fn vnodes(&self) -> Vec<VnodeHandle> {
        let mut nodes: Vec<VnodeHandle> = Vec::new();
        for entry in &self.entries {
            if !nodes.iter().any(|v| v.node() == entry.vnode.node()) {
                nodes.push(entry.vnode.clone());
            }
        }
        nodes
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitUpstreamEoi,
    WaitWorkersDone,
}

enum Flow {
    Continue,
    Stop,
}

enum Wake {
    BuilderExited,
    Deadline,
    Request(Option<ControlRequest>),
}

/// Await the drain deadline, or forever if none is armed
async fn drain_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

struct Control {
    id: ControlId,
    details: FittingDetails,
    state: State,
    roster: Roster,
    /// Own sender, handed to monitors so Down notifications loop back
    tx: mpsc::UnboundedSender<ControlRequest>,
    metrics: Arc<PipelineMetrics>,
}

/// Spawn a stage control and return its handle
///
/// The control binds its life to `builder_link`: if the builder exits
/// abnormally the control terminates and later callers observe it as gone.
pub(crate) fn spawn_control(
    spec: &FittingSpec,
    output: StageOutput,
    options: Arc<PipelineOptions>,
    topology: Topology,
    metrics: Arc<PipelineMetrics>,
    builder_link: CancellationToken,
) -> FittingHandle {
    let id = ControlId::next();
    let (tx, rx) = mpsc::unbounded_channel();

    let details = FittingDetails {
        stage: Arc::from(spec.name.as_str()),
        module_id: Arc::from(spec.module_id.as_str()),
        arg: spec.arg.clone(),
        partfun: spec.partfun.clone(),
        output,
        options,
        topology,
    };

    let handle = FittingHandle::new(id, Arc::clone(&details.stage), spec.partfun.clone(), tx.clone());

    let control = Control {
        id,
        details,
        state: State::WaitUpstreamEoi,
        roster: Roster::default(),
        tx,
        metrics,
    };

    tokio::spawn(control.run(rx, builder_link));

    handle
}

impl Control {
    async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<ControlRequest>,
        builder_link: CancellationToken,
    ) {
        info!(
            stage = %self.details.stage,
            id = %self.id,
            module = %self.details.module_id,
            output = self.details.output.kind(),
            "stage control starting"
        );

        // Armed when entering WaitWorkersDone, if a drain deadline is set
        let mut deadline: Option<Pin<Box<Sleep>>> = None;

        loop {
            let wake = tokio::select! {
                _ = builder_link.cancelled() => Wake::BuilderExited,
                _ = drain_deadline(&mut deadline) => Wake::Deadline,
                request = rx.recv() => Wake::Request(request),
            };

            match wake {
                Wake::BuilderExited => {
                    error!(stage = %self.details.stage, id = %self.id, "builder exited, abandoning stage");
                    break;
                }
                Wake::Deadline => {
                    error!(
                        stage = %self.details.stage,
                        id = %self.id,
                        waiting = self.roster.len(),
                        "drain deadline exceeded, abandoning stage"
                    );
                    break;
                }
                Wake::Request(None) => break,
                Wake::Request(Some(request)) => match self.handle(request, &mut deadline) {
                    Flow::Continue => {}
                    Flow::Stop => break,
                },
            }
        }

        info!(stage = %self.details.stage, id = %self.id, "stage control stopped");
    }

    fn handle(&mut self, request: ControlRequest, deadline: &mut Option<Pin<Box<Sleep>>>) -> Flow {
        match request {
            ControlRequest::GetDetails {
                partition,
                worker,
                vnode,
                reply,
            } => {
                self.register(partition, worker, vnode);
                let _ = reply.send(self.details.clone());
                Flow::Continue
            }

            ControlRequest::Eoi => match self.state {
                State::WaitUpstreamEoi => {
                    if self.roster.is_empty() {
                        // Nothing ever worked for this stage; the barrier
                        // is trivially satisfied
                        self.forward_eoi();
                        return Flow::Stop;
                    }
                    self.broadcast_eoi();
                    self.state = State::WaitWorkersDone;
                    if let Some(timeout) = self.details.options.eoi_timeout() {
                        *deadline = Some(Box::pin(tokio::time::sleep(timeout)));
                    }
                    Flow::Continue
                }
                // Upstream sends EOI exactly once; a duplicate is a bug
                // upstream but harmless here
                State::WaitWorkersDone => {
                    warn!(stage = %self.details.stage, "duplicate EOI ignored");
                    Flow::Continue
                }
            },

            ControlRequest::WorkerDone { worker, ack } => {
                let removed = self.roster.remove_worker(&worker);
                if removed > 0 {
                    self.metrics.record_worker_done();
                }
                debug!(
                    stage = %self.details.stage,
                    worker = %worker.id(),
                    removed,
                    remaining = self.roster.len(),
                    "worker done"
                );
                let _ = ack.send(());

                match self.state {
                    // Handoff relocation before upstream EOI: the worker
                    // left its old partition early. No empty-roster check;
                    // EOI has not been seen yet.
                    State::WaitUpstreamEoi => Flow::Continue,
                    State::WaitWorkersDone => self.check_drained(),
                }
            }

            ControlRequest::Workers { reply } => {
                let _ = reply.send(self.roster.partitions());
                Flow::Continue
            }

            ControlRequest::Down { worker } => {
                let removed = self.roster.remove_worker(&worker);
                if removed == 0 {
                    // Already removed by a done report; the monitor lost
                    // the race
                    return Flow::Continue;
                }
                self.metrics.record_worker_vanished();
                warn!(
                    stage = %self.details.stage,
                    worker = %worker.id(),
                    remaining = self.roster.len(),
                    "worker vanished without done"
                );
                match self.state {
                    State::WaitUpstreamEoi => Flow::Continue,
                    State::WaitWorkersDone => self.check_drained(),
                }
            }
        }
    }

    /// Add a worker to the roster, installing its liveness monitor
    ///
    /// Idempotent for a (partition, worker) pair already present. In
    /// `WaitWorkersDone` this is a late arrival relocated by handoff: it
    /// gets an immediate EOI so the drain never waits on a worker that
    /// missed the broadcast.
    fn register(&mut self, partition: PartitionId, worker: WorkerRef, vnode: VnodeHandle) {
        if self.roster.contains(partition, &worker) {
            debug!(
                stage = %self.details.stage,
                partition = %partition,
                worker = %worker.id(),
                "details re-requested"
            );
            return;
        }

        let token = monitor(&worker, self.tx.clone(), |w| ControlRequest::Down { worker: w });
        debug!(
            stage = %self.details.stage,
            partition = %partition,
            worker = %worker.id(),
            vnode = %vnode.node(),
            late = self.state == State::WaitWorkersDone,
            "worker registered"
        );

        let late_vnode = (self.state == State::WaitWorkersDone).then(|| vnode.clone());

        self.roster.insert(WorkerEntry {
            partition,
            worker,
            vnode,
            monitor: token,
        });

        if let Some(vnode) = late_vnode {
            vnode.deliver_eoi(self.id);
            self.metrics.record_eoi_broadcast();
        }
    }

    /// Tell every vnode hosting one of our workers to drain this stage
    fn broadcast_eoi(&self) {
        let vnodes = self.roster.vnodes();
        info!(
            stage = %self.details.stage,
            workers = self.roster.len(),
            vnodes = vnodes.len(),
            "broadcasting EOI"
        );
        for vnode in vnodes {
            vnode.deliver_eoi(self.id);
            self.metrics.record_eoi_broadcast();
        }
    }

    /// Pass the EOI barrier downstream
    fn forward_eoi(&self) {
        match &self.details.output {
            StageOutput::Stage(next) => {
                info!(stage = %self.details.stage, next = next.name(), "forwarding EOI");
                next.eoi();
            }
            StageOutput::Sink(sink) => {
                info!(stage = %self.details.stage, "notifying sink of EOI");
                sink.eoi(&self.details.stage);
            }
        }
        self.metrics.record_eoi_forwarded();
    }

    /// In `WaitWorkersDone`: terminate once the roster empties
    fn check_drained(&self) -> Flow {
        if self.roster.is_empty() {
            self.forward_eoi();
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}
