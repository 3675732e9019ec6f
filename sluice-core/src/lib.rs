//! Core contracts and data model for sluice pipeline runners
//!
//! This crate defines the pieces every runner variant builds on: the record
//! and stage-output model, the per-batch execution context, the pipe
//! abstraction wrapping stage computations, offset tracking, and the shared
//! runner contract. Concrete runners (such as the preview runner) live in
//! their own crates on top of these types.

#![warn(missing_docs)]

pub mod batch;
pub mod error;
pub mod metrics;
pub mod offset;
pub mod output;
pub mod pipe;
pub mod record;
pub mod runner;

// Re-export key types for convenience
pub use batch::PipeBatch;
pub use error::{Error, Result};
pub use metrics::{MetricRegistry, Timer};
pub use offset::OffsetTracker;
pub use output::{Lanes, StageOutput};
pub use pipe::{Pipe, PipeKind, Stage, StageType};
pub use record::Record;
pub use runner::{
    BadRecordsHandler, BatchListener, DiscardBadRecords, DiscardStats, Observer, PipelineRunner,
    RuntimeInfo, StatsAggregationHandler,
};
