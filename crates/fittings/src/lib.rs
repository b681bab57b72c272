//! Plumb - Fittings
//!
//! The user-module contract: what a stage's behavior looks like from the
//! substrate's point of view, plus the registry that turns module ids in
//! fitting specs into running instances, and a small set of built-ins.
//!
//! # Overview
//!
//! A *fitting module* is the pluggable behavior of one pipeline stage. Each
//! worker hosts exactly one module instance for its partition and drives it
//! through a fixed call sequence:
//!
//! ```text
//! create → init → process* → done            (normal life)
//!                  ├─ handoff                (adopt a predecessor's state)
//!                  └─ archive                (vacate the partition)
//! ```
//!
//! `init`, `process`, and `done` are required. `archive` and `handoff` are
//! optional with absent-by-default semantics: a module that does not
//! override them exports no state on archive and discards incoming
//! archives silently.
//!
//! Callbacks are synchronous and may block; the hosting worker runs them
//! one at a time and does nothing else while one is in flight.
//!
//! # Adding a Module
//!
//! 1. Implement [`Fitting`] for your per-worker instance type.
//! 2. Implement [`FittingModule`] for its factory, including
//!    `validate_arg` if the module is picky about its argument.
//! 3. Register the factory under your module id.
//!
//! ```
//! use plumb_fittings::{create_default_registry, FittingRegistry};
//! use plumb_protocol::Arg;
//!
//! let registry = create_default_registry();
//! let fitting = registry.create("pass", &Arg::None).unwrap();
//! # let _ = fitting;
//! ```
//!
//! # Modules
//!
//! - `registry` - Module id → factory mapping
//! - `validate` - Spec validation against a registry
//! - `pass` - Pass-through module
//! - `xform` - Per-item mapping via a shared function argument
//! - `sum` - Stateful accumulator with archive/handoff support

mod error;
pub mod pass;
pub mod registry;
pub mod sum;
mod validate;
pub mod xform;

pub use error::FittingError;
pub use pass::{PassFitting, PassModule};
pub use registry::{FittingModule, FittingRegistry};
pub use sum::{SumFitting, SumModule};
pub use validate::{validate_pipeline, validate_spec};
pub use xform::{Mapper, XformFitting, XformModule};

use plumb_protocol::{Archive, Item, PartitionId, PipelineOptions};

/// Result type for fitting operations
pub type FittingResult<T> = Result<T, FittingError>;

/// Where a fitting's `process` and `done` callbacks put their outputs
///
/// The hosting worker supplies the implementation; emission is best-effort
/// and non-blocking from the module's perspective.
pub trait Emit {
    /// Emit one output item downstream
    fn emit(&mut self, item: Item);
}

/// Context handed to a module's `init` callback
#[derive(Debug)]
pub struct InitCtx<'a> {
    /// Stage label from the fitting spec
    pub stage: &'a str,
    /// Partition this instance is responsible for
    pub partition: PartitionId,
    /// Pipeline-global options
    pub options: &'a PipelineOptions,
}

/// One stage's behavior, instantiated per (stage, partition)
///
/// Implementors own whatever state they need; the substrate treats it as
/// opaque and threads every callback through `&mut self`.
pub trait Fitting: Send {
    /// Prepare the instance for its partition
    ///
    /// Runs exactly once, before any input is delivered. Failure here
    /// terminates the worker with a classified init failure; the callback
    /// is never retried.
    fn init(&mut self, ctx: &InitCtx<'_>) -> FittingResult<()>;

    /// Process one input item, emitting any number of outputs
    fn process(&mut self, item: Item, out: &mut dyn Emit) -> FittingResult<()>;

    /// No further inputs will arrive; flush any pending outputs
    fn done(&mut self, out: &mut dyn Emit) -> FittingResult<()>;

    /// Capture state for handoff to this partition's next owner
    ///
    /// Returning `None` means the module exports no archive; the worker
    /// reports a distinguished undefined archive in that case.
    fn archive(&mut self) -> Option<Archive> {
        None
    }

    /// Adopt state archived by this partition's previous owner
    ///
    /// Returns whether the archive was adopted. The default discards it
    /// silently and returns `false`.
    fn handoff(&mut self, archive: Archive) -> bool {
        let _ = archive;
        false
    }
}

/// Create a registry with all built-in modules registered
///
/// Includes:
/// - `pass` - emit every input unchanged
/// - `xform` - map each input through a shared [`Mapper`]
/// - `sum` - accumulate numeric inputs, emit the total on done
pub fn create_default_registry() -> FittingRegistry {
    let mut registry = FittingRegistry::new();
    registry.register("pass", PassModule);
    registry.register("xform", XformModule);
    registry.register("sum", SumModule);
    registry
}
