//! Source offset tracking across batches

/// Tracks the source position across batch executions.
///
/// A single tracker instance is shared by every batch of a run and mutated
/// strictly sequentially: the committed offset is read at batch start, a new
/// offset may be staged while the origin processes, and [`commit`] advances
/// staged to committed between batches. Violating that order produces
/// off-by-one offsets downstream, so runners must not reorder these calls.
///
/// [`commit`]: OffsetTracker::commit
pub trait OffsetTracker {
    /// The committed offset, i.e. where the next batch should resume.
    /// `None` means the source has not produced an offset yet.
    fn offset(&self) -> Option<String>;

    /// Stage a new offset to take effect at the next commit
    fn set_offset(&mut self, offset: Option<String>);

    /// Advance the committed offset to the staged one
    fn commit(&mut self);
}
