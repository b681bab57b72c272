//! Plumb - Protocol
//!
//! Passive data model shared by every crate in the workspace.
//!
//! # Overview
//!
//! A pipeline is an ordered chain of *fittings* (stages). Each fitting is
//! described by a [`FittingSpec`]: a name, the id of the user module that
//! implements its behavior, an opaque argument for that module, and a
//! [`Partfun`] that decides which partition each emitted item lands on.
//!
//! This crate holds only data: identifiers, payloads, specs, options, and
//! the vnode→worker input message. Channels, actors, and everything that
//! moves lives in `plumb-pipeline`.
//!
//! # Modules
//!
//! - `partition` - Partition identifier
//! - `item` - Opaque payload flowing through the pipeline
//! - `arg` - Opaque module initialization argument
//! - `archive` - Opaque worker state captured for handoff
//! - `partfun` - Output routing selector
//! - `spec` - Fitting specification
//! - `options` - Pipeline-global options
//! - `message` - Vnode→worker input replies
//! - `error` - Protocol error types

mod arg;
mod archive;
mod error;
mod item;
mod message;
mod options;
mod partfun;
mod partition;
mod spec;

pub use arg::Arg;
pub use archive::Archive;
pub use error::SpecError;
pub use item::Item;
pub use message::WorkerInput;
pub use options::{PipelineOptions, TraceLevel};
pub use partfun::{PartitionFn, Partfun};
pub use partition::PartitionId;
pub use spec::FittingSpec;

/// Result type for spec validation
pub type SpecResult<T> = Result<T, SpecError>;
