//! Routing error types

use thiserror::Error;

use crate::NodeId;

/// Errors from topology construction
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A placement referenced a node outside the topology
    #[error("{node} out of range: topology has {node_count} nodes")]
    NodeOutOfRange { node: NodeId, node_count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = RoutingError::NodeOutOfRange {
            node: NodeId::new(5),
            node_count: 2,
        };
        assert_eq!(err.to_string(), "node:5 out of range: topology has 2 nodes");
    }
}
