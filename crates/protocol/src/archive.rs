//! Worker state archives
//!
//! When a worker is asked to vacate its partition (handoff), its module may
//! capture its state as an `Archive`. The archive travels to the partition's
//! new owner and is replayed into the replacement worker's module.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque worker state captured for handoff
///
/// Modules that export no archive callback produce [`Archive::Undefined`];
/// the receiving side discards it silently unless the module opts in to
/// handoff. Stateful modules encode whatever they need as a JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Archive {
    /// The vacating module exported no state
    Undefined,
    /// Module-defined state blob
    Value(Value),
}

impl Archive {
    /// Wrap module state
    #[inline]
    pub fn new(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Check whether the vacating module exported any state
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Borrow the state blob, if any
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Undefined => None,
            Self::Value(v) => Some(v),
        }
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Value(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_undefined() {
        let a = Archive::Undefined;
        assert!(a.is_undefined());
        assert!(a.value().is_none());
        assert_eq!(a.to_string(), "undefined");
    }

    #[test]
    fn test_value() {
        let a = Archive::new(json!({"total": 10}));
        assert!(!a.is_undefined());
        assert_eq!(a.value().unwrap()["total"], 10);
    }
}
