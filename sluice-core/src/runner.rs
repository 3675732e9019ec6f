//! Shared contract between pipeline runner variants

use crate::error::{Error, Result};
use crate::metrics::MetricRegistry;
use crate::output::StageOutput;
use crate::pipe::Pipe;
use crate::record::Record;

/// Opaque handle to the runtime environment a pipeline executes in.
/// Runners pass it through untouched; its contents belong to the platform.
#[derive(Debug, Clone, Default)]
pub struct RuntimeInfo {
    id: String,
}

impl RuntimeInfo {
    /// Create a handle with the given environment identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Identifier of the environment
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Routes records that stages rejected during processing.
///
/// Preview runners accept a handler but never invoke it; routing bad
/// records is a production concern.
pub trait BadRecordsHandler {
    /// Handle records rejected by stages during one batch
    fn handle(&mut self, records: &[Record]) -> Result<()>;
}

/// Aggregates per-batch statistics.
///
/// Preview runners accept a handler but never invoke it.
pub trait StatsAggregationHandler {
    /// Fold one batch's captured outputs into the aggregate
    fn handle(&mut self, snapshot: &[StageOutput]) -> Result<()>;
}

/// Evaluates user-configured rules over records flowing through the
/// pipeline. Registration point only; preview runners store nothing.
pub trait Observer {
    /// Inspect one batch's captured outputs
    fn observe(&mut self, snapshot: &[StageOutput]);
}

/// Receives notifications around every batch. Registration point only;
/// preview runners store nothing.
pub trait BatchListener {
    /// A batch is about to be processed
    fn batch_started(&mut self);

    /// A batch finished processing
    fn batch_completed(&mut self);
}

/// Handler that discards everything it is given
pub struct DiscardBadRecords;

impl BadRecordsHandler for DiscardBadRecords {
    fn handle(&mut self, _records: &[Record]) -> Result<()> {
        Ok(())
    }
}

/// Stats handler that discards everything it is given
pub struct DiscardStats;

impl StatsAggregationHandler for DiscardStats {
    fn handle(&mut self, _snapshot: &[StageOutput]) -> Result<()> {
        Ok(())
    }
}

/// The contract every pipeline runner variant satisfies.
///
/// A pipeline is an origin pipe plus a collection of downstream pipe
/// chains. Runners drive batches through the pipes and own the resulting
/// per-batch output snapshots.
pub trait PipelineRunner {
    /// Whether this runner captures output for inspection instead of
    /// committing state to external systems
    fn is_preview(&self) -> bool;

    /// The runtime environment this pipeline executes in
    fn runtime_info(&self) -> &RuntimeInfo;

    /// Metrics collected by this runner
    fn metrics(&self) -> &MetricRegistry;

    /// Run the pipeline with an empty override set
    fn run(
        &mut self,
        origin: &mut Pipe,
        chains: &mut [Vec<Pipe>],
        bad_records: &mut dyn BadRecordsHandler,
        stats: &mut dyn StatsAggregationHandler,
    ) -> Result<()>;

    /// Run the pipeline, substituting the supplied outputs for the stages
    /// they are keyed to instead of executing those stages
    fn run_with_overrides(
        &mut self,
        origin: &mut Pipe,
        chains: &mut [Vec<Pipe>],
        bad_records: &mut dyn BadRecordsHandler,
        overrides: Vec<StageOutput>,
        stats: &mut dyn StatsAggregationHandler,
    ) -> Result<()>;

    /// Release every pipe's resources: the origin on its own, then each
    /// chain independently. Callable whether or not a run happened.
    fn destroy(
        &mut self,
        origin: &mut Pipe,
        chains: &mut [Vec<Pipe>],
        bad_records: &mut dyn BadRecordsHandler,
        stats: &mut dyn StatsAggregationHandler,
    ) -> Result<()>;

    /// Snapshots accumulated so far, one entry per completed batch
    fn batches_output(&self) -> &[Vec<StageOutput>];

    /// Previous offset observed at the start of the last executed batch
    fn source_offset(&self) -> Option<&str>;

    /// Offset after the most recent commit
    fn new_source_offset(&self) -> Option<&str>;

    /// Install an observer. Inert in runner variants that do not evaluate
    /// rules.
    fn set_observer(&mut self, observer: Box<dyn Observer>);

    /// Register a batch listener. Inert in runner variants that do not
    /// emit batch notifications.
    fn register_listener(&mut self, listener: Box<dyn BatchListener>);

    /// Hook invoked when a run fails. Default: nothing.
    fn error_notification(&mut self, _origin: &Pipe, _chains: &[Vec<Pipe>], _error: &Error) {}
}
