//! Stage handles and details
//!
//! A `FittingHandle` is the addressable identity of one stage: it wraps the
//! control's mailbox, a unique id distinguishing reincarnations, and a
//! cached copy of the stage's partition function so routers never have to
//! call back into the control.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use plumb_protocol::{Arg, Partfun, PartitionId, PipelineOptions};
use plumb_routing::PartitionTable;
use tokio::sync::{mpsc, oneshot};

use crate::control::ControlRequest;
use crate::monitor::WorkerRef;
use crate::sink::SinkHandle;
use crate::vnode::VnodeHandle;
use crate::PipelineError;

/// Stage control identifier, unique within the process
///
/// Freshly minted for every control spawn, so a reincarnated stage is
/// never confused with its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlId(u64);

impl ControlId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "control:{}", self.0)
    }
}

/// Handle to one stage's control
///
/// Cheap to clone; all clones address the same control. Once the control
/// terminates, request operations return [`PipelineError::Gone`].
#[derive(Clone)]
pub struct FittingHandle {
    id: ControlId,
    name: Arc<str>,
    partfun: Partfun,
    tx: mpsc::UnboundedSender<ControlRequest>,
}

impl FittingHandle {
    pub(crate) fn new(
        id: ControlId,
        name: Arc<str>,
        partfun: Partfun,
        tx: mpsc::UnboundedSender<ControlRequest>,
    ) -> Self {
        Self {
            id,
            name,
            partfun,
            tx,
        }
    }

    /// Unique id of the stage control behind this handle
    #[inline]
    pub fn id(&self) -> ControlId {
        self.id
    }

    /// Stage label from the fitting spec
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached copy of the stage's partition function
    #[inline]
    pub fn partfun(&self) -> &Partfun {
        &self.partfun
    }

    /// Register a worker and fetch the stage's details
    ///
    /// The caller asserts that `worker` is the worker at `partition`,
    /// hosted by `vnode`. Registration is idempotent for an already-known
    /// (partition, worker) pair.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Gone`] if the control has terminated.
    pub async fn get_details(
        &self,
        partition: PartitionId,
        worker: WorkerRef,
        vnode: VnodeHandle,
    ) -> crate::Result<FittingDetails> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest::GetDetails {
                partition,
                worker,
                vnode,
                reply,
            })
            .map_err(|_| PipelineError::Gone)?;
        rx.await.map_err(|_| PipelineError::Gone)
    }

    /// Signal that no further inputs will arrive from upstream
    ///
    /// Never errors: a control that is already gone has nothing left to
    /// drain.
    pub fn eoi(&self) {
        let _ = self.tx.send(ControlRequest::Eoi);
    }

    /// Report that a worker has finished
    ///
    /// Waits for the control to acknowledge the removal, so the worker's
    /// termination can never race ahead of its own done report. A gone
    /// control is ignored.
    pub async fn worker_done(&self, worker: WorkerRef) {
        let (ack, rx) = oneshot::channel();
        if self
            .tx
            .send(ControlRequest::WorkerDone { worker, ack })
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// Partitions currently working for this stage
    ///
    /// Returns a copy; the roster itself never leaves the control.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Gone`] if the control has terminated.
    pub async fn workers(&self) -> crate::Result<Vec<PartitionId>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlRequest::Workers { reply })
            .map_err(|_| PipelineError::Gone)?;
        rx.await.map_err(|_| PipelineError::Gone)
    }
}

impl fmt::Debug for FittingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittingHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("partfun", &self.partfun.kind())
            .finish()
    }
}

/// Where a stage's outputs go
#[derive(Debug, Clone)]
pub enum StageOutput {
    /// The next fitting in the chain
    Stage(FittingHandle),
    /// The pipeline sink
    Sink(SinkHandle),
}

impl StageOutput {
    /// Short tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stage(_) => "stage",
            Self::Sink(_) => "sink",
        }
    }
}

/// Node placement shared by every stage of one pipeline
#[derive(Debug, Clone)]
pub struct Topology {
    /// Partition → node placement
    pub table: Arc<PartitionTable>,
    /// Vnode handles indexed by node id
    pub nodes: Arc<[VnodeHandle]>,
}

impl Topology {
    /// The vnode hosting a partition's work queue
    #[inline]
    pub fn node_for(&self, partition: PartitionId) -> &VnodeHandle {
        &self.nodes[self.table.node_for(partition).as_usize()]
    }
}

/// Everything a worker needs to run its stage
///
/// Created once per stage, handed out read-only by the control on demand.
#[derive(Debug, Clone)]
pub struct FittingDetails {
    /// Stage label
    pub stage: Arc<str>,
    /// User module implementing the stage
    pub module_id: Arc<str>,
    /// Opaque module argument
    pub arg: Arg,
    /// This stage's own output routing selector
    pub partfun: Partfun,
    /// The next stage's handle, or the sink
    pub output: StageOutput,
    /// Pipeline-global options
    pub options: Arc<PipelineOptions>,
    /// Node placement for emission routing
    pub topology: Topology,
}
