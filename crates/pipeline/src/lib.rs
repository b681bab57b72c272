//! Plumb - Pipeline
//!
//! The runtime half of the substrate: stage controls, workers, vnodes, and
//! the end-of-inputs protocol that ties them together.
//!
//! # Architecture
//!
//! ```text
//! [Source]                 [Stage 1]                  [Stage 2]        [Sink]
//!    │                  FittingControl ───── EOI ── FittingControl ──── EOI
//!    │                    ▲ roster │                   ▲
//!    │        GetDetails ─┘        └─ DeliverEOI       │
//!    │                                                 │
//!    └─ inject ──→ Vnode ⇄ Worker(P0) ── emit ──→ Vnode ⇄ Worker(P0) ─→ results
//!                  Vnode ⇄ Worker(P1) ── emit ──→ Vnode ⇄ Worker(P1) ─→
//! ```
//!
//! # Key Design
//!
//! - **Actors**: every control, worker, and vnode is a logically
//!   single-threaded tokio task with a serial mailbox; handlers never block
//! - **Pull-based workers**: a worker asks its vnode for one input at a
//!   time, so a slow user callback never piles work inside the worker
//! - **EOI barrier**: a stage's control forwards EOI downstream only after
//!   every worker that ever registered with it reported done; chaining the
//!   barrier stage by stage orders EOI after all data
//! - **Handoff tolerant**: workers that vacate a partition before EOI are
//!   forgotten; workers that register after EOI are told to drain
//!   immediately, so relocation never wedges the barrier
//!
//! # Example
//!
//! ```ignore
//! use plumb_fittings::create_default_registry;
//! use plumb_pipeline::PipelineBuilder;
//! use plumb_protocol::{FittingSpec, Item, PartitionId};
//! use std::sync::Arc;
//!
//! let mut pipeline = PipelineBuilder::new(Arc::new(create_default_registry()))
//!     .fitting(FittingSpec::new("echo", "pass"))
//!     .build()?;
//!
//! pipeline.inject(PartitionId::new(0), Item::from("hello"));
//! pipeline.eoi();
//! let results = pipeline.sink().drain_until_eoi().await;
//! ```
//!
//! # Modules
//!
//! - `control` - Per-stage control actor: roster + EOI synchronization
//! - `worker` - Per-partition worker actor driving a fitting instance
//! - `vnode` - In-memory vnode: work queues, dispatch, handoff transport
//! - `monitor` - One-shot worker liveness monitors
//! - `handle` - Stage handles and details
//! - `emitter` - Output emission and routing
//! - `sink` - Terminal result/EOI receiver
//! - `builder` - Pipeline construction and wiring
//! - `metrics` - Substrate counters

mod builder;
mod control;
mod emitter;
mod error;
mod handle;
mod metrics;
mod monitor;
mod sink;
mod vnode;
mod worker;

pub use builder::{Pipeline, PipelineBuilder};
pub use error::PipelineError;
pub use handle::{ControlId, FittingDetails, FittingHandle, StageOutput, Topology};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use monitor::{WorkerId, WorkerRef};
pub use sink::{sink_channel, SinkCollector, SinkEvent, SinkHandle};
pub use vnode::{spawn_vnode, VnodeHandle};

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
