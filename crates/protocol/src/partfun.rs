//! Output routing selector
//!
//! Every fitting spec names a partition function that decides where the
//! stage's outputs land: either "follow" (stay on the emitting partition)
//! or a deterministic pure function of the output item.

use std::fmt;
use std::sync::Arc;

use crate::{Item, PartitionId};

/// A deterministic pure function from an output item to a partition
pub type PartitionFn = Arc<dyn Fn(&Item) -> PartitionId + Send + Sync>;

/// Routing selector for a stage's outputs
///
/// `Follow` keeps an output on the partition that produced it, which is the
/// right choice for per-key chains of stages. `Fun` recomputes placement
/// from the output itself. The function must be deterministic: the same
/// item must always map to the same partition, or replays after handoff
/// would scatter.
///
/// Delivery to the pipeline sink is not a partition function; it is
/// expressed by wiring a stage's output to the sink handle instead of a
/// downstream fitting.
#[derive(Clone)]
pub enum Partfun {
    /// Send outputs to the same partition as the sender
    Follow,
    /// Compute the target partition from the output item
    Fun(PartitionFn),
}

impl Partfun {
    /// Build a `Fun` selector from a closure
    pub fn fun<F>(f: F) -> Self
    where
        F: Fn(&Item) -> PartitionId + Send + Sync + 'static,
    {
        Self::Fun(Arc::new(f))
    }

    /// Check for the follow selector
    #[inline]
    pub fn is_follow(&self) -> bool {
        matches!(self, Self::Follow)
    }

    /// Short tag for logging
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::Fun(_) => "fun",
        }
    }
}

impl fmt::Debug for Partfun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Follow => write!(f, "Partfun::Follow"),
            Self::Fun(_) => write!(f, "Partfun::Fun(..)"),
        }
    }
}

impl Default for Partfun {
    fn default() -> Self {
        Self::Follow
    }
}
