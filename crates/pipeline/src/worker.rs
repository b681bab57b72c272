//! Worker actor
//!
//! One worker per (stage, partition), spawned by the hosting vnode when
//! work first arrives. The worker's first act is registering with its
//! stage's control via the details request; after that it pulls inputs one
//! at a time and drives its fitting instance through the module contract.
//!
//! A worker never reports done while any of its emissions could still be
//! unregistered downstream: it settles its admission acks first, so the
//! EOI barrier it releases cannot overtake work it produced.

use std::sync::Arc;

use plumb_fittings::{FittingRegistry, InitCtx};
use plumb_protocol::{Archive, PartitionId, WorkerInput};
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

use crate::emitter::Emitter;
use crate::handle::FittingHandle;
use crate::metrics::PipelineMetrics;
use crate::monitor::WorkerRef;
use crate::vnode::VnodeHandle;
use crate::PipelineError;

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    /// Between init and the first input request
    InitialInputRequest,
    /// Steady state: awaiting the vnode's reply
    WaitForInput,
}

impl WorkerState {
    fn tag(self) -> &'static str {
        match self {
            Self::InitialInputRequest => "initial_input_request",
            Self::WaitForInput => "wait_for_input",
        }
    }
}

/// Spawn a worker task for one (stage, partition)
pub(crate) fn spawn_worker(
    stage: FittingHandle,
    partition: PartitionId,
    vnode: VnodeHandle,
    registry: Arc<FittingRegistry>,
    metrics: Arc<PipelineMetrics>,
) {
    tokio::spawn(run_worker(stage, partition, vnode, registry, metrics));
}

/// Drop admission acks that have already resolved
fn settle_ready(admissions: &mut Vec<oneshot::Receiver<()>>) {
    admissions.retain_mut(|rx| matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
}

/// Wait for every outstanding admission
async fn settle_all(admissions: &mut Vec<oneshot::Receiver<()>>) {
    for rx in admissions.drain(..) {
        let _ = rx.await;
    }
}

async fn run_worker(
    stage: FittingHandle,
    partition: PartitionId,
    vnode: VnodeHandle,
    registry: Arc<FittingRegistry>,
    metrics: Arc<PipelineMetrics>,
) {
    let me = WorkerRef::new();
    // Trips the liveness monitors on every exit path
    let _term = me.term_guard();

    // Registration doubles as the details fetch; a gone control means the
    // stage already finished or failed, and this worker has no business
    let details = match stage.get_details(partition, me.clone(), vnode.clone()).await {
        Ok(details) => {
            vnode.worker_registered(stage.id(), partition);
            details
        }
        Err(_) => {
            debug!(stage = stage.name(), partition = %partition, "stage gone before registration");
            // Release anyone waiting on admission; there is nothing left
            // to admit into
            vnode.worker_registered(stage.id(), partition);
            return;
        }
    };

    let trace_level = details.options.trace;

    let mut fitting = match registry.create(&details.module_id, &details.arg) {
        Ok(fitting) => fitting,
        Err(err) => {
            let report = PipelineError::init_failed(&err);
            error!(
                stage = %details.stage,
                partition = %partition,
                worker = %me.id(),
                %report,
                "fitting creation failed"
            );
            return;
        }
    };

    let ctx = InitCtx {
        stage: &details.stage,
        partition,
        options: &details.options,
    };
    if let Err(err) = fitting.init(&ctx) {
        let report = PipelineError::init_failed(&err);
        error!(
            stage = %details.stage,
            partition = %partition,
            worker = %me.id(),
            %report,
            "fitting init failed"
        );
        return;
    }

    if trace_level.lifecycle() {
        debug!(stage = %details.stage, partition = %partition, worker = %me.id(), "worker up");
    }

    // Acks for emissions not yet admitted downstream
    let mut admissions: Vec<oneshot::Receiver<()>> = Vec::new();

    // Defer the first input request one scheduling step so the spawning
    // vnode finishes its bookkeeping before the request lands
    let mut state = WorkerState::InitialInputRequest;
    tokio::task::yield_now().await;

    loop {
        let Some(input) = vnode.next_input(stage.id(), partition).await else {
            debug!(stage = %details.stage, partition = %partition, "vnode gone, worker exiting");
            return;
        };
        if trace_level.per_item() {
            trace!(
                stage = %details.stage,
                partition = %partition,
                state = state.tag(),
                input = input.kind(),
                "input received"
            );
        }
        state = WorkerState::WaitForInput;

        match input {
            WorkerInput::Item(item) => {
                let mut emitter = Emitter::new(&details, partition, &metrics, &mut admissions);
                if let Err(err) = fitting.process(item, &mut emitter) {
                    error!(
                        stage = %details.stage,
                        partition = %partition,
                        worker = %me.id(),
                        error = %err,
                        "process failed, abandoning worker"
                    );
                    return;
                }
                metrics.record_processed();
                settle_ready(&mut admissions);
            }

            WorkerInput::Done => {
                let mut emitter = Emitter::new(&details, partition, &metrics, &mut admissions);
                if let Err(err) = fitting.done(&mut emitter) {
                    // The monitor reports this exit; done is never retried
                    error!(
                        stage = %details.stage,
                        partition = %partition,
                        worker = %me.id(),
                        error = %err,
                        "done callback failed"
                    );
                    return;
                }
                settle_all(&mut admissions).await;
                stage.worker_done(me.clone()).await;
                if trace_level.lifecycle() {
                    debug!(stage = %details.stage, partition = %partition, worker = %me.id(), "worker drained");
                }
                return;
            }

            WorkerInput::Handoff(archive) => {
                let adopted = fitting.handoff(archive);
                if trace_level.lifecycle() {
                    debug!(
                        stage = %details.stage,
                        partition = %partition,
                        worker = %me.id(),
                        adopted,
                        "predecessor archive received"
                    );
                }
            }

            WorkerInput::Archive => {
                let archive = fitting.archive().unwrap_or(Archive::Undefined);
                if trace_level.lifecycle() {
                    debug!(
                        stage = %details.stage,
                        partition = %partition,
                        worker = %me.id(),
                        exported = !archive.is_undefined(),
                        "vacating partition"
                    );
                }
                let admitted = vnode.reply_archive(stage.id(), partition, archive);
                // The successor must be in the roster before this worker's
                // done can release the barrier on the old partition
                settle_all(&mut admissions).await;
                let _ = admitted.await;
                stage.worker_done(me.clone()).await;
                return;
            }
        }
    }
}
