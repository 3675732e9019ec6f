//! Pipe abstraction: the execution wrapper around a stage

use crate::batch::PipeBatch;
use crate::error::Result;
use crate::output::{Lanes, StageOutput};

/// The role a stage plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageType {
    /// Produces records from an external source
    Origin,
    /// Transforms records in flight
    Processor,
    /// Writes records to an external system
    Target,
    /// Triggers side effects in an external system
    Executor,
}

impl StageType {
    /// Whether this stage type terminates the data flow. Terminal stages are
    /// the ones suppressed when a runner is configured to skip targets.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageType::Target | StageType::Executor)
    }
}

/// A named unit of pipeline computation wrapped by a pipe
pub trait Stage: Send {
    /// Unique instance name; the identity key for overrides and skips
    fn instance_name(&self) -> &str;

    /// The role this stage plays in the pipeline
    fn stage_type(&self) -> StageType;

    /// Consume available input from the batch (upstream lanes, or the
    /// current offset for origins) and produce output records per lane.
    /// Origins stage the offset they reached via
    /// [`PipeBatch::set_new_offset`].
    fn process(&mut self, batch: &mut PipeBatch) -> Result<Lanes>;

    /// Release resources acquired at construction. Called exactly once per
    /// destroy pass and must not assume `process` ever ran.
    fn destroy(&mut self) -> Result<()>;
}

/// The pipe variants layered over a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeKind {
    /// Wraps the stage's real computation
    PlainStage,
    /// Applies configured observation logic over the stream without
    /// altering pipeline shape
    Observer,
    /// Fans records out across multiple downstream lanes
    Multiplexer,
}

impl PipeKind {
    /// Observer and multiplexer pipes carry pipeline-shape logic rather
    /// than stage computation, so an override for their identity never
    /// suppresses their execution.
    pub fn always_executes(&self) -> bool {
        !matches!(self, PipeKind::PlainStage)
    }
}

/// Execution wrapper around one stage.
///
/// A pipe's identity is its wrapped stage's instance name. Pipes are
/// arranged once at pipeline-construction time and hold no state across
/// batches beyond resources the stage acquired at construction.
pub struct Pipe {
    kind: PipeKind,
    stage: Box<dyn Stage>,
}

impl Pipe {
    /// Create a pipe of the given kind around a stage
    pub fn new(kind: PipeKind, stage: Box<dyn Stage>) -> Self {
        Self { kind, stage }
    }

    /// Wrap a stage's real computation
    pub fn plain(stage: Box<dyn Stage>) -> Self {
        Self::new(PipeKind::PlainStage, stage)
    }

    /// Layer observation logic over a stage's stream
    pub fn observer(stage: Box<dyn Stage>) -> Self {
        Self::new(PipeKind::Observer, stage)
    }

    /// Fan a stage's output across downstream lanes
    pub fn multiplexer(stage: Box<dyn Stage>) -> Self {
        Self::new(PipeKind::Multiplexer, stage)
    }

    /// The variant of this pipe
    pub fn kind(&self) -> PipeKind {
        self.kind
    }

    /// Identity of this pipe: the wrapped stage's instance name
    pub fn instance_name(&self) -> &str {
        self.stage.instance_name()
    }

    /// The wrapped stage's role
    pub fn stage_type(&self) -> StageType {
        self.stage.stage_type()
    }

    /// Execute the wrapped stage and record its output into the batch,
    /// keyed by this pipe's identity
    pub fn process(&mut self, batch: &mut PipeBatch) -> Result<()> {
        let lanes = self.stage.process(batch)?;
        batch.capture(StageOutput::new(self.stage.instance_name(), lanes));
        Ok(())
    }

    /// Release the wrapped stage's resources. Never re-triggers processing.
    pub fn destroy(&mut self, _batch: &mut PipeBatch) -> Result<()> {
        self.stage.destroy()
    }
}
