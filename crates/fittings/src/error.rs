//! Fitting error types

use thiserror::Error;

/// Errors raised by fitting modules
///
/// The substrate never retries a failed callback; a `process` or `done`
/// failure abandons the worker, and an `init` failure is reported with its
/// classification so the hosting vnode can decide what to do next.
#[derive(Debug, Error)]
pub enum FittingError {
    /// The module cannot work with the supplied argument
    #[error("bad argument: {0}")]
    BadArg(String),

    /// The callback failed
    #[error("{0}")]
    Failed(String),
}

impl FittingError {
    /// Create a bad-argument error
    pub fn bad_arg(reason: impl Into<String>) -> Self {
        Self::BadArg(reason.into())
    }

    /// Create a generic callback failure
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Classification tag used in init-failure reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadArg(_) => "badarg",
            Self::Failed(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_kind() {
        let err = FittingError::bad_arg("expected a number");
        assert_eq!(err.to_string(), "bad argument: expected a number");
        assert_eq!(err.kind(), "badarg");

        let err = FittingError::failed("downstream unavailable");
        assert_eq!(err.to_string(), "downstream unavailable");
        assert_eq!(err.kind(), "error");
    }
}
