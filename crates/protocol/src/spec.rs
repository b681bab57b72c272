//! Fitting specification
//!
//! A `FittingSpec` is the immutable description of one pipeline stage,
//! supplied at construction time and never changed afterwards.

use crate::{Arg, Partfun};

/// Immutable description of one pipeline stage
///
/// # Example
///
/// ```
/// use plumb_protocol::{Arg, FittingSpec, Partfun};
///
/// let spec = FittingSpec::new("dedup", "pass")
///     .with_arg(Arg::value(42))
///     .with_partfun(Partfun::Follow);
///
/// assert_eq!(spec.name, "dedup");
/// assert_eq!(spec.module_id, "pass");
/// ```
#[derive(Debug, Clone)]
pub struct FittingSpec {
    /// Stage label used in logs and sink results
    pub name: String,

    /// Id of the user module implementing this stage's behavior
    pub module_id: String,

    /// Opaque initialization argument, passed through to the module
    pub arg: Arg,

    /// Where this stage's outputs land
    pub partfun: Partfun,
}

impl FittingSpec {
    /// Create a spec with no argument and follow routing
    pub fn new(name: impl Into<String>, module_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module_id: module_id.into(),
            arg: Arg::None,
            partfun: Partfun::Follow,
        }
    }

    /// Set the module argument
    #[must_use]
    pub fn with_arg(mut self, arg: Arg) -> Self {
        self.arg = arg;
        self
    }

    /// Set the output routing selector
    #[must_use]
    pub fn with_partfun(mut self, partfun: Partfun) -> Self {
        self.partfun = partfun;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Item, PartitionId};

    #[test]
    fn test_defaults() {
        let spec = FittingSpec::new("s1", "pass");
        assert!(spec.arg.is_none());
        assert!(spec.partfun.is_follow());
    }

    #[test]
    fn test_builder_style() {
        let spec = FittingSpec::new("shard", "xform")
            .with_arg(Arg::value("cfg"))
            .with_partfun(Partfun::fun(|i: &Item| {
                PartitionId::new(i.as_i64().unwrap_or(0) as u32)
            }));

        assert_eq!(spec.arg.as_value().unwrap(), "cfg");
        assert_eq!(spec.partfun.kind(), "fun");
    }
}
