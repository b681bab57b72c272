//! Module initialization argument
//!
//! The argument in a fitting spec is passed through to the user module
//! untouched. Modules that need plain data take a JSON value; modules that
//! need behavior (a mapping function, a comparator) take a shared object
//! and downcast it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Opaque initialization argument for a fitting module
///
/// The substrate forwards the argument verbatim from the spec to the
/// module's constructor and `validate_arg` hook. Three shapes cover the
/// practical cases:
///
/// - [`Arg::None`] - the module takes no configuration
/// - [`Arg::Value`] - plain data, e.g. a threshold or a field name
/// - [`Arg::Shared`] - an `Arc`'d object the module downcasts, e.g. a
///   mapping closure
#[derive(Clone, Default)]
pub enum Arg {
    /// No argument supplied
    #[default]
    None,
    /// Plain JSON data
    Value(Value),
    /// Shared opaque object; modules downcast to their expected type
    Shared(Arc<dyn Any + Send + Sync>),
}

impl Arg {
    /// Wrap plain data
    #[inline]
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    /// Wrap a shared object
    #[inline]
    pub fn shared<T: Any + Send + Sync>(v: T) -> Self {
        Self::Shared(Arc::new(v))
    }

    /// Borrow the JSON data, if this argument carries any
    #[inline]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Downcast the shared object to a concrete type
    ///
    /// Returns `None` if the argument is not [`Arg::Shared`] or the
    /// downcast fails.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Shared(obj) => Arc::clone(obj).downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Check whether an argument was supplied at all
    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "Arg::None"),
            Self::Value(v) => write!(f, "Arg::Value({})", v),
            Self::Shared(_) => write!(f, "Arg::Shared(..)"),
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}
