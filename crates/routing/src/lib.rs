//! Plumb - Routing
//!
//! Pure routing helpers: where does an emitted item go, and which node
//! hosts a given partition.
//!
//! # Key Design
//!
//! - **Compiled once**: the [`PartitionTable`] is built before the pipeline
//!   starts; lookups in the hot path allocate nothing
//! - **Two questions, two functions**: [`route`] answers "which partition
//!   does this output belong to", the table answers "which node owns that
//!   partition"
//! - **Default fallback**: partitions without an explicit placement map to
//!   the table's default node, so a single-node deployment needs no
//!   assignments at all

mod error;
mod node;
mod table;

pub use error::RoutingError;
pub use node::NodeId;
pub use table::{PartitionTable, PartitionTableBuilder};

use plumb_protocol::{Item, PartitionId, Partfun};

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Resolve the partition an emitted item belongs to
///
/// `Follow` keeps the item on the partition that emitted it; `Fun` asks the
/// stage's partition function. This is the hot path of every emission, so
/// it takes everything by reference and never allocates.
#[inline]
pub fn route(partfun: &Partfun, item: &Item, from: PartitionId) -> PartitionId {
    match partfun {
        Partfun::Follow => from,
        Partfun::Fun(f) => f(item),
    }
}
