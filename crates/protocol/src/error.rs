//! Protocol error types
//!
//! Validation-time failures. These abort pipeline construction and are
//! never retried.

use thiserror::Error;

/// Reasons a fitting spec is rejected before a pipeline is built
#[derive(Debug, Error)]
pub enum SpecError {
    /// The spec names a module that is not registered
    #[error("fitting '{fitting}': unknown module '{module}', available: [{available}]")]
    UnknownModule {
        fitting: String,
        module: String,
        available: String,
    },

    /// The module's argument validator rejected the supplied argument
    #[error("fitting '{fitting}': module '{module}' rejected argument: {reason}")]
    BadArg {
        fitting: String,
        module: String,
        reason: String,
    },

    /// Two fittings in one pipeline carry the same name
    #[error("duplicate fitting name '{0}'")]
    DuplicateName(String),

    /// A pipeline must contain at least one fitting
    #[error("pipeline contains no fittings")]
    Empty,
}

impl SpecError {
    /// Create an unknown-module error
    pub fn unknown_module(
        fitting: impl Into<String>,
        module: impl Into<String>,
        available: &[&str],
    ) -> Self {
        Self::UnknownModule {
            fitting: fitting.into(),
            module: module.into(),
            available: available.join(", "),
        }
    }

    /// Create a rejected-argument error
    pub fn bad_arg(
        fitting: impl Into<String>,
        module: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::BadArg {
            fitting: fitting.into(),
            module: module.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_module_display() {
        let err = SpecError::unknown_module("s1", "nope", &["pass", "xform"]);
        let msg = err.to_string();
        assert!(msg.contains("'s1'"));
        assert!(msg.contains("'nope'"));
        assert!(msg.contains("pass, xform"));
    }

    #[test]
    fn test_bad_arg_display() {
        let err = SpecError::bad_arg("s2", "sum", "expected numeric start");
        assert!(err.to_string().contains("expected numeric start"));
    }

    #[test]
    fn test_empty_display() {
        assert!(SpecError::Empty.to_string().contains("no fittings"));
    }
}
