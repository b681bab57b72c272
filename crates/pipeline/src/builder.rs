//! Pipeline construction
//!
//! The builder validates every fitting spec, spawns the vnode layer, and
//! wires stage controls back to front so each control knows its output
//! before it exists to anyone else. The returned [`Pipeline`] is the
//! source-side face of the running chain: inject inputs, signal EOI,
//! collect results.

use std::fmt;
use std::sync::Arc;

use plumb_fittings::{validate_pipeline, FittingRegistry};
use plumb_protocol::{FittingSpec, Item, PartitionId, PipelineOptions};
use plumb_routing::{NodeId, PartitionTable, PartitionTableBuilder};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::control::spawn_control;
use crate::handle::{FittingHandle, StageOutput, Topology};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::sink::{sink_channel, SinkCollector};
use crate::vnode::{spawn_vnode, VnodeHandle};

/// Builder for a running pipeline
///
/// # Example
///
/// ```ignore
/// let mut pipeline = PipelineBuilder::new(registry)
///     .fitting(FittingSpec::new("double", "xform").with_arg(double_arg))
///     .fitting(FittingSpec::new("total", "sum"))
///     .build()?;
/// ```
pub struct PipelineBuilder {
    registry: Arc<FittingRegistry>,
    options: PipelineOptions,
    specs: Vec<FittingSpec>,
    nodes: usize,
    table: Option<PartitionTable>,
}

impl PipelineBuilder {
    /// Start a builder over the given module registry
    #[must_use]
    pub fn new(registry: Arc<FittingRegistry>) -> Self {
        Self {
            registry,
            options: PipelineOptions::default(),
            specs: Vec::new(),
            nodes: 1,
            table: None,
        }
    }

    /// Set pipeline-global options
    #[must_use]
    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of vnodes to spawn
    ///
    /// Ignored when an explicit partition table is supplied; the table's
    /// node count wins.
    #[must_use]
    pub fn nodes(mut self, count: usize) -> Self {
        self.nodes = count.max(1);
        self
    }

    /// Supply an explicit partition placement
    #[must_use]
    pub fn partition_table(mut self, table: PartitionTable) -> Self {
        self.table = Some(table);
        self
    }

    /// Append a stage to the chain
    #[must_use]
    pub fn fitting(mut self, spec: FittingSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Validate, spawn, and wire the pipeline
    ///
    /// # Errors
    ///
    /// Any spec rejection aborts construction; nothing is spawned on
    /// failure.
    pub fn build(self) -> crate::Result<Pipeline> {
        validate_pipeline(&self.specs, &self.registry)?;

        let options = Arc::new(self.options);
        let metrics = Arc::new(PipelineMetrics::new());
        let table = Arc::new(
            self.table
                .unwrap_or_else(|| PartitionTableBuilder::new(self.nodes).build()),
        );

        let vnodes: Vec<VnodeHandle> = (0..table.node_count())
            .map(|index| {
                spawn_vnode(
                    NodeId::new(index as u16),
                    Arc::clone(&self.registry),
                    Arc::clone(&options),
                    Arc::clone(&metrics),
                )
            })
            .collect();
        let topology = Topology {
            table,
            nodes: Arc::from(vnodes),
        };

        let (sink_handle, collector) = sink_channel();
        let builder_link = CancellationToken::new();

        // Wire back to front: each control is born knowing its output
        let mut output = StageOutput::Sink(sink_handle);
        let mut stages = Vec::with_capacity(self.specs.len());
        for spec in self.specs.iter().rev() {
            let handle = spawn_control(
                spec,
                output,
                Arc::clone(&options),
                topology.clone(),
                Arc::clone(&metrics),
                builder_link.clone(),
            );
            output = StageOutput::Stage(handle.clone());
            stages.push(handle);
        }
        stages.reverse();

        let first = stages[0].clone();
        info!(
            stages = stages.len(),
            nodes = topology.nodes.len(),
            "pipeline built"
        );

        Ok(Pipeline {
            first,
            stages,
            topology,
            builder_link,
            metrics,
            sink: collector,
        })
    }
}

/// A running pipeline, seen from the source side
pub struct Pipeline {
    first: FittingHandle,
    stages: Vec<FittingHandle>,
    topology: Topology,
    builder_link: CancellationToken,
    metrics: Arc<PipelineMetrics>,
    sink: SinkCollector,
}

impl Pipeline {
    /// Admit one input on a partition
    ///
    /// The item lands on the vnode hosting `partition` and flows through
    /// the whole chain from there. Returns once the partition's worker has
    /// registered with the first stage, so an [`eoi`](Self::eoi) issued
    /// afterwards can never overtake the input.
    pub async fn inject(&self, partition: PartitionId, item: Item) {
        let admitted = self
            .topology
            .node_for(partition)
            .queue_work_acked(self.first.clone(), item, partition);
        let _ = admitted.await;
    }

    /// Signal that the source has no further inputs
    ///
    /// The barrier ripples down the chain stage by stage; the sink's EOI
    /// notification arrives after the last result.
    pub fn eoi(&self) {
        self.first.eoi();
    }

    /// Handle of a stage, by name
    pub fn stage(&self, name: &str) -> Option<&FittingHandle> {
        self.stages.iter().find(|handle| handle.name() == name)
    }

    /// Handles of every stage, first to last
    pub fn stages(&self) -> &[FittingHandle] {
        &self.stages
    }

    /// Handle of a vnode, by node id
    pub fn node(&self, node: NodeId) -> Option<&VnodeHandle> {
        self.topology.nodes.get(node.as_usize())
    }

    /// The collecting side of the pipeline sink
    pub fn sink(&mut self) -> &mut SinkCollector {
        &mut self.sink
    }

    /// Point-in-time copy of the substrate counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Tear the pipeline down as if its builder died
    ///
    /// Every stage control terminates abnormally; later requests observe
    /// them as gone. Queued work is abandoned.
    pub fn abort(&self) {
        self.builder_link.cancel();
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .field("nodes", &self.topology.nodes.len())
            .finish()
    }
}
