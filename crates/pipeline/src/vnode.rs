//! In-memory vnode
//!
//! A vnode owns the work queues for the partitions it hosts, spawns a
//! worker the first time work arrives for a (stage, partition), and feeds
//! that worker one input at a time. It also runs the transport side of
//! handoff: directing a worker to vacate, then shipping the archive plus
//! any unprocessed backlog to the partition's new host.
//!
//! # Admission
//!
//! Enqueueing is non-blocking, but callers that need the EOI barrier to be
//! sound can request an *admission ack*: a one-shot that resolves once the
//! queue's worker has registered with its stage control. The source awaits
//! admission before signaling EOI, an emitting worker awaits its pending
//! admissions before reporting done, and a vacating worker awaits its
//! successor's registration before reporting done on the old partition.
//! Registration is therefore always in the roster before the event that
//! could have let EOI pass it.
//!
//! Queue depth is unbounded; emission upstream is non-blocking by
//! contract, so the vnode surfaces pressure through logs and counters
//! instead of refusing work.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use plumb_fittings::FittingRegistry;
use plumb_protocol::{Archive, Item, PartitionId, PipelineOptions, WorkerInput};
use plumb_routing::NodeId;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::handle::{ControlId, FittingHandle};
use crate::metrics::PipelineMetrics;
use crate::worker::spawn_worker;

/// Requests a vnode answers, in mailbox order
pub(crate) enum VnodeRequest {
    /// Enqueue one item for a stage's partition
    QueueWork {
        stage: FittingHandle,
        partition: PartitionId,
        item: Item,
        /// Resolved once the queue's worker has registered
        ack: Option<oneshot::Sender<()>>,
    },
    /// A worker asks for its next input
    NextInput {
        stage: ControlId,
        partition: PartitionId,
        reply: oneshot::Sender<WorkerInput>,
    },
    /// The queue's worker has registered with its stage control
    WorkerRegistered {
        stage: ControlId,
        partition: PartitionId,
    },
    /// The stage's control says no further inputs will arrive
    DeliverEoi { stage: ControlId },
    /// Direct the worker at a partition to vacate toward `target`
    StartHandoff {
        stage: ControlId,
        partition: PartitionId,
        target: VnodeHandle,
    },
    /// The vacating worker's captured state
    ReplyArchive {
        stage: ControlId,
        partition: PartitionId,
        archive: Archive,
        /// Resolved once the successor worker has registered
        admitted: oneshot::Sender<()>,
    },
    /// Archive plus unprocessed backlog arriving from a peer vnode
    HandoffIn {
        stage: FittingHandle,
        partition: PartitionId,
        archive: Archive,
        backlog: VecDeque<WorkerInput>,
        admitted: oneshot::Sender<()>,
    },
}

/// Handle to one vnode
///
/// Cheap to clone; all clones address the same vnode actor.
#[derive(Clone)]
pub struct VnodeHandle {
    node: NodeId,
    tx: mpsc::UnboundedSender<VnodeRequest>,
}

impl VnodeHandle {
    /// The node this handle addresses
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Enqueue one item, fire-and-forget
    ///
    /// A vnode that has shut down drops the item.
    pub fn queue_work(&self, stage: FittingHandle, item: Item, partition: PartitionId) {
        let _ = self.tx.send(VnodeRequest::QueueWork {
            stage,
            partition,
            item,
            ack: None,
        });
    }

    /// Enqueue one item, returning its admission ack
    ///
    /// The ack resolves once the queue's worker has registered with its
    /// stage control (or is dropped if the vnode is gone).
    pub(crate) fn queue_work_acked(
        &self,
        stage: FittingHandle,
        item: Item,
        partition: PartitionId,
    ) -> oneshot::Receiver<()> {
        let (ack, rx) = oneshot::channel();
        let _ = self.tx.send(VnodeRequest::QueueWork {
            stage,
            partition,
            item,
            ack: Some(ack),
        });
        rx
    }

    /// Pull the next input for a worker
    ///
    /// Returns `None` if the vnode is gone or the partition's queue was
    /// dismantled; the worker unwinds in either case.
    pub(crate) async fn next_input(
        &self,
        stage: ControlId,
        partition: PartitionId,
    ) -> Option<WorkerInput> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(VnodeRequest::NextInput {
                stage,
                partition,
                reply,
            })
            .ok()?;
        rx.await.ok()
    }

    /// Report that this queue's worker finished registering
    pub(crate) fn worker_registered(&self, stage: ControlId, partition: PartitionId) {
        let _ = self
            .tx
            .send(VnodeRequest::WorkerRegistered { stage, partition });
    }

    /// Mark a stage drained on this vnode
    pub(crate) fn deliver_eoi(&self, stage: ControlId) {
        let _ = self.tx.send(VnodeRequest::DeliverEoi { stage });
    }

    /// Relocate a stage's partition to another vnode
    ///
    /// The current worker is told to vacate on its next input request; its
    /// archive and any unprocessed backlog travel to `target`.
    pub fn start_handoff(&self, stage: &FittingHandle, partition: PartitionId, target: &VnodeHandle) {
        let _ = self.tx.send(VnodeRequest::StartHandoff {
            stage: stage.id(),
            partition,
            target: target.clone(),
        });
    }

    /// Deliver a vacating worker's archive
    ///
    /// The returned ack resolves once the successor worker on the target
    /// vnode has registered; the vacating worker waits for it before
    /// reporting done on the old partition.
    pub(crate) fn reply_archive(
        &self,
        stage: ControlId,
        partition: PartitionId,
        archive: Archive,
    ) -> oneshot::Receiver<()> {
        let (admitted, rx) = oneshot::channel();
        let _ = self.tx.send(VnodeRequest::ReplyArchive {
            stage,
            partition,
            archive,
            admitted,
        });
        rx
    }

    fn handoff_in(
        &self,
        stage: FittingHandle,
        partition: PartitionId,
        archive: Archive,
        backlog: VecDeque<WorkerInput>,
        admitted: oneshot::Sender<()>,
    ) {
        let _ = self.tx.send(VnodeRequest::HandoffIn {
            stage,
            partition,
            archive,
            backlog,
            admitted,
        });
    }

    /// Handle plus raw request stream, for driving protocol tests
    #[cfg(test)]
    pub(crate) fn test_pair(node: NodeId) -> (Self, mpsc::UnboundedReceiver<VnodeRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { node, tx }, rx)
    }
}

impl fmt::Debug for VnodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VnodeHandle").field("node", &self.node).finish()
    }
}

/// One stage-partition's queue state
struct WorkQueue {
    stage: FittingHandle,
    /// Pending inputs: items and handoff markers only
    items: VecDeque<WorkerInput>,
    /// A worker's parked input request, fulfilled by the next arrival
    pending: Option<oneshot::Sender<WorkerInput>>,
    /// Set while this partition is vacating toward another vnode
    handoff_to: Option<VnodeHandle>,
    /// Whether the queue's worker has registered with its control
    ready: bool,
    /// Admission acks parked until the worker registers
    ready_waiters: Vec<oneshot::Sender<()>>,
}

impl WorkQueue {
    fn new(stage: FittingHandle) -> Self {
        Self {
            stage,
            items: VecDeque::new(),
            pending: None,
            handoff_to: None,
            ready: false,
            ready_waiters: Vec::new(),
        }
    }

    /// Resolve an admission ack now or once the worker registers
    fn admit(&mut self, ack: oneshot::Sender<()>) {
        if self.ready {
            let _ = ack.send(());
        } else {
            self.ready_waiters.push(ack);
        }
    }
}

struct Vnode {
    node: NodeId,
    handle: VnodeHandle,
    registry: Arc<FittingRegistry>,
    options: Arc<PipelineOptions>,
    metrics: Arc<PipelineMetrics>,
    queues: HashMap<(ControlId, PartitionId), WorkQueue>,
    /// Stages the controls have declared drained on this vnode
    drained: HashSet<ControlId>,
}

/// Spawn a vnode actor and return its handle
pub fn spawn_vnode(
    node: NodeId,
    registry: Arc<FittingRegistry>,
    options: Arc<PipelineOptions>,
    metrics: Arc<PipelineMetrics>,
) -> VnodeHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = VnodeHandle { node, tx };

    let vnode = Vnode {
        node,
        handle: handle.clone(),
        registry,
        options,
        metrics,
        queues: HashMap::new(),
        drained: HashSet::new(),
    };

    tokio::spawn(vnode.run(rx));

    handle
}

impl Vnode {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<VnodeRequest>) {
        info!(node = %self.node, "vnode starting");

        while let Some(request) = rx.recv().await {
            self.handle_request(request);
        }

        info!(node = %self.node, queues = self.queues.len(), "vnode stopped");
    }

    fn handle_request(&mut self, request: VnodeRequest) {
        match request {
            VnodeRequest::QueueWork {
                stage,
                partition,
                item,
                ack,
            } => self.queue_work(stage, partition, item, ack),

            VnodeRequest::NextInput {
                stage,
                partition,
                reply,
            } => self.next_input(stage, partition, reply),

            VnodeRequest::WorkerRegistered { stage, partition } => {
                self.worker_registered(stage, partition)
            }

            VnodeRequest::DeliverEoi { stage } => self.deliver_eoi(stage),

            VnodeRequest::StartHandoff {
                stage,
                partition,
                target,
            } => self.start_handoff(stage, partition, target),

            VnodeRequest::ReplyArchive {
                stage,
                partition,
                archive,
                admitted,
            } => self.reply_archive(stage, partition, archive, admitted),

            VnodeRequest::HandoffIn {
                stage,
                partition,
                archive,
                backlog,
                admitted,
            } => self.handoff_in(stage, partition, archive, backlog, admitted),
        }
    }

    fn queue_work(
        &mut self,
        stage: FittingHandle,
        partition: PartitionId,
        item: Item,
        ack: Option<oneshot::Sender<()>>,
    ) {
        let warn_depth = self.options.queue_warn_depth;
        let metrics = Arc::clone(&self.metrics);
        let queue = Self::ensure_queue(
            &mut self.queues,
            &self.handle,
            &self.registry,
            &metrics,
            stage,
            partition,
        );

        metrics.record_queued();
        if let Some(ack) = ack {
            queue.admit(ack);
        }

        // An idle worker with no relocation in progress gets the item
        // straight away
        if queue.handoff_to.is_none() {
            if let Some(reply) = queue.pending.take() {
                let _ = reply.send(WorkerInput::Item(item));
                metrics.record_dispatched();
                return;
            }
        }

        queue.items.push_back(WorkerInput::Item(item));
        if queue.items.len() == warn_depth {
            warn!(
                node = %self.node,
                stage = queue.stage.name(),
                partition = %partition,
                depth = warn_depth,
                "work queue past warning depth"
            );
        }
    }

    fn next_input(
        &mut self,
        stage: ControlId,
        partition: PartitionId,
        reply: oneshot::Sender<WorkerInput>,
    ) {
        let Some(queue) = self.queues.get_mut(&(stage, partition)) else {
            // Queue already dismantled (handoff finished); dropping the
            // reply unwinds the requester
            debug!(node = %self.node, stage = %stage, partition = %partition, "input request for dismantled queue");
            return;
        };

        if queue.handoff_to.is_some() {
            let _ = reply.send(WorkerInput::Archive);
            return;
        }
        if let Some(input) = queue.items.pop_front() {
            self.metrics.record_dispatched();
            let _ = reply.send(input);
            return;
        }
        if self.drained.contains(&stage) {
            let _ = reply.send(WorkerInput::Done);
            // The worker will not ask again
            self.queues.remove(&(stage, partition));
            return;
        }
        queue.pending = Some(reply);
    }

    fn worker_registered(&mut self, stage: ControlId, partition: PartitionId) {
        let Some(queue) = self.queues.get_mut(&(stage, partition)) else {
            return;
        };
        queue.ready = true;
        for waiter in queue.ready_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn deliver_eoi(&mut self, stage: ControlId) {
        if !self.drained.insert(stage) {
            trace!(node = %self.node, stage = %stage, "stage already drained here");
            return;
        }
        debug!(node = %self.node, stage = %stage, "stage drained on this vnode");

        // Idle workers of the drained stage can finish right now
        let mut finished = Vec::new();
        for (key, queue) in self.queues.iter_mut() {
            if key.0 == stage && queue.items.is_empty() && queue.handoff_to.is_none() {
                if let Some(reply) = queue.pending.take() {
                    let _ = reply.send(WorkerInput::Done);
                    finished.push(*key);
                }
            }
        }
        for key in finished {
            self.queues.remove(&key);
        }
    }

    fn start_handoff(&mut self, stage: ControlId, partition: PartitionId, target: VnodeHandle) {
        let Some(queue) = self.queues.get_mut(&(stage, partition)) else {
            warn!(node = %self.node, stage = %stage, partition = %partition, "no worker to hand off");
            return;
        };
        if queue.handoff_to.is_some() {
            warn!(node = %self.node, partition = %partition, "handoff already in progress");
            return;
        }

        debug!(
            node = %self.node,
            stage = queue.stage.name(),
            partition = %partition,
            target = %target.node(),
            "vacating partition"
        );
        queue.handoff_to = Some(target);

        if let Some(reply) = queue.pending.take() {
            let _ = reply.send(WorkerInput::Archive);
        }
    }

    fn reply_archive(
        &mut self,
        stage: ControlId,
        partition: PartitionId,
        archive: Archive,
        admitted: oneshot::Sender<()>,
    ) {
        let Some(queue) = self.queues.remove(&(stage, partition)) else {
            warn!(node = %self.node, stage = %stage, partition = %partition, "archive for unknown queue");
            return;
        };
        let Some(target) = queue.handoff_to else {
            warn!(node = %self.node, partition = %partition, "archive without a handoff in progress");
            return;
        };

        debug!(
            node = %self.node,
            stage = queue.stage.name(),
            partition = %partition,
            target = %target.node(),
            backlog = queue.items.len(),
            exported = !archive.is_undefined(),
            "transferring partition"
        );
        target.handoff_in(queue.stage, partition, archive, queue.items, admitted);
        self.metrics.record_handoff();
    }

    fn handoff_in(
        &mut self,
        stage: FittingHandle,
        partition: PartitionId,
        archive: Archive,
        backlog: VecDeque<WorkerInput>,
        admitted: oneshot::Sender<()>,
    ) {
        let metrics = Arc::clone(&self.metrics);
        let queue = Self::ensure_queue(
            &mut self.queues,
            &self.handle,
            &self.registry,
            &metrics,
            stage,
            partition,
        );

        // The archive precedes every transferred input; locally queued
        // items keep their place behind it
        queue.items.push_front(WorkerInput::Handoff(archive));
        queue.items.extend(backlog);
        queue.admit(admitted);

        if queue.handoff_to.is_none() {
            if let Some(reply) = queue.pending.take() {
                if let Some(input) = queue.items.pop_front() {
                    metrics.record_dispatched();
                    let _ = reply.send(input);
                }
            }
        }
    }

    /// Get the queue for a (stage, partition), spawning its worker on
    /// first contact
    fn ensure_queue<'a>(
        queues: &'a mut HashMap<(ControlId, PartitionId), WorkQueue>,
        handle: &VnodeHandle,
        registry: &Arc<FittingRegistry>,
        metrics: &Arc<PipelineMetrics>,
        stage: FittingHandle,
        partition: PartitionId,
    ) -> &'a mut WorkQueue {
        match queues.entry((stage.id(), partition)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(
                    node = %handle.node(),
                    stage = stage.name(),
                    partition = %partition,
                    "starting worker"
                );
                spawn_worker(
                    stage.clone(),
                    partition,
                    handle.clone(),
                    Arc::clone(registry),
                    Arc::clone(metrics),
                );
                metrics.record_worker_spawned();
                entry.insert(WorkQueue::new(stage))
            }
        }
    }
}
