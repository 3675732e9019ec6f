//! Preview pipeline runner
//!
//! This crate implements the preview variant of the sluice pipeline runner:
//! a bounded, single-threaded engine that drives a fixed number of batches
//! through a pipeline, capturing every stage's output per batch so a user
//! can inspect and debug pipeline behavior without committing state or
//! emitting side effects to external systems.
//!
//! Callers can substitute previously captured output for specific stages
//! (overrides) and suppress execution of terminal stages (skip-targets).

#![warn(missing_docs)]

pub mod config;
pub mod offset;
pub mod runner;

pub use config::PreviewConfig;
pub use offset::PreviewOffsetTracker;
pub use runner::PreviewPipelineRunner;
