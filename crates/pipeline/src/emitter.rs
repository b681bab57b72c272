//! Output emission
//!
//! The emitter is what a fitting's `process` and `done` callbacks see as
//! their output side. Each emitted item is routed by the *next* stage's
//! partition function and enqueued at the vnode hosting that partition, or
//! delivered straight to the sink when the stage is last in the chain.
//!
//! Emission never blocks the worker; each enqueue leaves behind an
//! admission ack that the worker settles before it reports done, which is
//! what keeps the downstream EOI barrier from overtaking fresh work.

use plumb_protocol::{Item, PartitionId};
use tokio::sync::oneshot;

use crate::handle::{FittingDetails, StageOutput};
use crate::metrics::PipelineMetrics;

/// Routes one worker's outputs downstream
pub(crate) struct Emitter<'a> {
    details: &'a FittingDetails,
    from: PartitionId,
    metrics: &'a PipelineMetrics,
    admissions: &'a mut Vec<oneshot::Receiver<()>>,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(
        details: &'a FittingDetails,
        from: PartitionId,
        metrics: &'a PipelineMetrics,
        admissions: &'a mut Vec<oneshot::Receiver<()>>,
    ) -> Self {
        Self {
            details,
            from,
            metrics,
            admissions,
        }
    }
}

impl plumb_fittings::Emit for Emitter<'_> {
    fn emit(&mut self, item: Item) {
        match &self.details.output {
            StageOutput::Sink(sink) => {
                sink.deliver(&self.details.stage, item);
            }
            StageOutput::Stage(next) => {
                let partition = plumb_routing::route(next.partfun(), &item, self.from);
                let vnode = self.details.topology.node_for(partition);
                self.admissions
                    .push(vnode.queue_work_acked(next.clone(), item, partition));
            }
        }
        self.metrics.record_emitted();
    }
}
