//! Vnode→worker input replies
//!
//! A worker pulls work from its hosting vnode one request at a time; the
//! vnode answers each request with exactly one of these forms.

use crate::{Archive, Item};

/// Reply to a worker's next-input request
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerInput {
    /// One payload to process
    Item(Item),
    /// No further inputs will arrive; drain and finish
    Done,
    /// State archived by this partition's previous owner; adopt or discard
    Handoff(Archive),
    /// Vacate the partition: capture state and terminate
    Archive,
}

impl WorkerInput {
    /// Short tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Item(_) => "item",
            Self::Done => "done",
            Self::Handoff(_) => "handoff",
            Self::Archive => "archive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(WorkerInput::Item(Item::from(1i64)).kind(), "item");
        assert_eq!(WorkerInput::Done.kind(), "done");
        assert_eq!(WorkerInput::Handoff(Archive::Undefined).kind(), "handoff");
        assert_eq!(WorkerInput::Archive.kind(), "archive");
    }
}
