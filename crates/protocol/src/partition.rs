//! Partition identifier type
//!
//! `PartitionId` names one slice of a stage's parallel work.
//! Designed to be `Copy` and cheap to hash for roster lookups.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Partition identifier
///
/// Each stage runs at most one worker per partition. Partition ids are
/// assigned by whoever admits inputs (the source side); the substrate only
/// requires that equal ids mean the same queue.
///
/// # Example
///
/// ```
/// use plumb_protocol::PartitionId;
///
/// let p = PartitionId::new(3);
/// assert_eq!(p.as_u32(), 3);
/// assert_eq!(p.to_string(), "partition:3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(u32);

impl PartitionId {
    /// Create a new partition id from a numeric index
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the numeric index of this partition
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get the index as usize (for array indexing)
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition:{}", self.0)
    }
}

impl From<u32> for PartitionId {
    #[inline]
    fn from(index: u32) -> Self {
        Self::new(index)
    }
}

impl From<PartitionId> for u32 {
    #[inline]
    fn from(id: PartitionId) -> Self {
        id.0
    }
}
