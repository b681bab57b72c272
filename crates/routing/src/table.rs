//! Partition placement table
//!
//! Maps partitions to the nodes that host their work queues. Compiled once
//! before the pipeline starts; the lookup path is allocation-free.

use std::collections::HashMap;

use plumb_protocol::PartitionId;

use crate::{NodeId, RoutingError};

/// Pre-compiled partition→node placement
///
/// # Example
///
/// ```
/// use plumb_protocol::PartitionId;
/// use plumb_routing::{NodeId, PartitionTableBuilder};
///
/// let mut builder = PartitionTableBuilder::new(2);
/// builder.assign(PartitionId::new(1), NodeId::new(1)).unwrap();
/// let table = builder.build();
///
/// // Explicit placement
/// assert_eq!(table.node_for(PartitionId::new(1)), NodeId::new(1));
/// // Everything else falls back to the default node
/// assert_eq!(table.node_for(PartitionId::new(7)), NodeId::new(0));
/// ```
#[derive(Debug, Clone)]
pub struct PartitionTable {
    /// Explicit placements
    assignments: HashMap<PartitionId, NodeId>,

    /// Node for partitions without an explicit placement
    default_node: NodeId,

    /// Number of nodes in the topology
    node_count: usize,
}

impl PartitionTable {
    /// A single-node table: every partition maps to node 0
    pub fn single_node() -> Self {
        Self {
            assignments: HashMap::new(),
            default_node: NodeId::new(0),
            node_count: 1,
        }
    }

    /// Look up the node hosting a partition
    ///
    /// Falls back to the default node for unassigned partitions.
    #[inline]
    pub fn node_for(&self, partition: PartitionId) -> NodeId {
        self.assignments
            .get(&partition)
            .copied()
            .unwrap_or(self.default_node)
    }

    /// Number of nodes in the topology
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of explicit placements
    #[inline]
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

impl Default for PartitionTable {
    fn default() -> Self {
        Self::single_node()
    }
}

/// Builder for partition tables with placement validation
#[derive(Debug)]
pub struct PartitionTableBuilder {
    assignments: HashMap<PartitionId, NodeId>,
    default_node: NodeId,
    node_count: usize,
}

impl PartitionTableBuilder {
    /// Create a builder for a topology of `node_count` nodes
    ///
    /// The default node is node 0. A `node_count` of zero is clamped to
    /// one; a topology needs somewhere to put work.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            assignments: HashMap::new(),
            default_node: NodeId::new(0),
            node_count: node_count.max(1),
        }
    }

    /// Place a partition on a node
    ///
    /// Re-assigning a partition replaces the previous placement.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::NodeOutOfRange`] if the node is not part of
    /// the topology.
    pub fn assign(&mut self, partition: PartitionId, node: NodeId) -> crate::Result<()> {
        if node.as_usize() >= self.node_count {
            return Err(RoutingError::NodeOutOfRange {
                node,
                node_count: self.node_count,
            });
        }
        self.assignments.insert(partition, node);
        Ok(())
    }

    /// Change the fallback node for unassigned partitions
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::NodeOutOfRange`] if the node is not part of
    /// the topology.
    pub fn default_node(&mut self, node: NodeId) -> crate::Result<()> {
        if node.as_usize() >= self.node_count {
            return Err(RoutingError::NodeOutOfRange {
                node,
                node_count: self.node_count,
            });
        }
        self.default_node = node;
        Ok(())
    }

    /// Finish building the table
    #[must_use]
    pub fn build(self) -> PartitionTable {
        PartitionTable {
            assignments: self.assignments,
            default_node: self.default_node,
            node_count: self.node_count,
        }
    }
}
