//! Pipeline error types

use plumb_protocol::SpecError;
use thiserror::Error;

/// Errors surfaced by the pipeline runtime
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The addressed stage control no longer exists
    ///
    /// The stage has either finished or failed; callers must unwind.
    #[error("stage control is gone")]
    Gone,

    /// A worker's fitting could not be created or initialized
    ///
    /// `kind` classifies the failure (`badarg` vs `error`); the worker
    /// terminates with this reason and the hosting vnode decides whether a
    /// later input warrants a fresh attempt.
    #[error("worker init failed ({kind}): {info}")]
    InitFailed { kind: &'static str, info: String },

    /// A fitting spec was rejected during validation
    #[error(transparent)]
    Spec(#[from] SpecError),
}

impl PipelineError {
    /// Create an init-failure report from a fitting error
    pub fn init_failed(err: &plumb_fittings::FittingError) -> Self {
        Self::InitFailed {
            kind: err.kind(),
            info: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plumb_fittings::FittingError;

    #[test]
    fn test_gone_display() {
        assert_eq!(PipelineError::Gone.to_string(), "stage control is gone");
    }

    #[test]
    fn test_init_failed_classification() {
        let err = PipelineError::init_failed(&FittingError::bad_arg("no mapper"));
        assert_eq!(
            err.to_string(),
            "worker init failed (badarg): bad argument: no mapper"
        );

        let err = PipelineError::init_failed(&FittingError::failed("boom"));
        assert_eq!(err.to_string(), "worker init failed (error): boom");
    }

    #[test]
    fn test_spec_error_propagates() {
        let err: PipelineError = SpecError::Empty.into();
        assert!(err.to_string().contains("no fittings"));
    }
}
