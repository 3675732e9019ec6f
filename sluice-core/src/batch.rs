//! Per-batch execution context

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::offset::OffsetTracker;
use crate::output::StageOutput;
use crate::pipe::Pipe;

/// Mutable execution context for one batch.
///
/// A batch accumulates every stage's output in execution order, supports
/// substituting a caller-supplied output for a stage, and supports marking a
/// stage as skipped. An instance name is in exactly one of
/// {captured, overridden, skipped} at any time: capturing or overriding
/// clears a skip mark, and skipping drops a captured entry.
///
/// The batch only stores override mappings; it does not itself prevent a
/// pipe from executing. The runner consults the override set before deciding
/// whether to invoke `process` at all.
pub struct PipeBatch {
    previous_offset: Option<String>,
    new_offset: Option<String>,
    batch_size: usize,
    preview: bool,
    outputs: Vec<StageOutput>,
    positions: HashMap<String, usize>,
    skipped: HashSet<String>,
}

impl PipeBatch {
    /// Create a fresh batch bound to the tracker's current position
    pub fn new(tracker: &dyn OffsetTracker, batch_size: usize, preview: bool) -> Self {
        Self {
            previous_offset: tracker.offset(),
            new_offset: None,
            batch_size,
            preview,
            outputs: Vec::new(),
            positions: HashMap::new(),
            skipped: HashSet::new(),
        }
    }

    /// The tracker's committed offset at the time this batch started
    pub fn previous_offset(&self) -> Option<&str> {
        self.previous_offset.as_deref()
    }

    /// The offset staged by the origin while producing this batch, if any
    pub fn new_offset(&self) -> Option<&str> {
        self.new_offset.as_deref()
    }

    /// Stage the offset the source reached while producing this batch
    pub fn set_new_offset(&mut self, offset: Option<String>) {
        self.new_offset = offset;
    }

    /// Maximum number of records per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Whether this batch belongs to a preview run
    pub fn is_preview(&self) -> bool {
        self.preview
    }

    /// Output previously captured for the given stage instance, if any
    pub fn output_for(&self, instance: &str) -> Option<&StageOutput> {
        self.positions.get(instance).map(|&i| &self.outputs[i])
    }

    /// Record the output a pipe produced by executing its stage.
    /// A repeated capture for the same identity replaces the earlier one
    /// in place, keeping the original position in execution order.
    pub(crate) fn capture(&mut self, output: StageOutput) {
        trace!(instance = output.instance(), records = output.record_count(), "captured stage output");
        self.skipped.remove(output.instance());
        match self.positions.get(output.instance()) {
            Some(&i) => self.outputs[i] = output,
            None => {
                self.positions
                    .insert(output.instance().to_string(), self.outputs.len());
                self.outputs.push(output);
            }
        }
    }

    /// Register `output` as the result for the pipe's stage in this batch.
    ///
    /// Fails with a runtime error if the output's instance name does not
    /// match the pipe it is applied to. Calling this twice for the same
    /// identity overwrites the earlier value (last-write-wins); callers
    /// supplying duplicate overrides get the final one.
    pub fn override_stage_output(&mut self, pipe: &Pipe, output: StageOutput) -> Result<()> {
        if output.instance() != pipe.instance_name() {
            return Err(Error::Runtime(format!(
                "override output for '{}' applied to stage '{}'",
                output.instance(),
                pipe.instance_name()
            )));
        }
        debug!(instance = pipe.instance_name(), "overriding stage output");
        self.capture(output);
        Ok(())
    }

    /// Mark the pipe's stage as skipped for this batch. Skipped stages leave
    /// no entry in the snapshot.
    pub fn skip_stage(&mut self, pipe: &Pipe) {
        debug!(instance = pipe.instance_name(), "skipping stage");
        if let Some(i) = self.positions.remove(pipe.instance_name()) {
            self.outputs.remove(i);
            for position in self.positions.values_mut() {
                if *position > i {
                    *position -= 1;
                }
            }
        }
        self.skipped.insert(pipe.instance_name().to_string());
    }

    /// Ordered snapshot of every captured or overridden stage output for
    /// this batch, excluding skipped stages. Order follows pipe execution
    /// order: origin first, then downstream in chain order.
    pub fn snapshot(&self) -> Vec<StageOutput> {
        self.outputs.clone()
    }
}
