//! In-memory offset tracking for preview runs

use sluice_core::OffsetTracker;

/// Offset tracker that never persists anything.
///
/// Preview runs keep the whole offset lifecycle in memory: the committed
/// offset is where the next batch resumes, and a commit with nothing staged
/// leaves the committed offset untouched (an overridden origin never stages
/// an offset, so the position simply does not advance for that batch).
#[derive(Debug, Default)]
pub struct PreviewOffsetTracker {
    committed: Option<String>,
    staged: Option<String>,
}

impl PreviewOffsetTracker {
    /// Create a tracker starting at the given source position
    pub fn new(initial: Option<String>) -> Self {
        Self {
            committed: initial,
            staged: None,
        }
    }
}

impl OffsetTracker for PreviewOffsetTracker {
    fn offset(&self) -> Option<String> {
        self.committed.clone()
    }

    fn set_offset(&mut self, offset: Option<String>) {
        self.staged = offset;
    }

    fn commit(&mut self) {
        if let Some(offset) = self.staged.take() {
            self.committed = Some(offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_advances_staged_to_committed() {
        let mut tracker = PreviewOffsetTracker::new(Some("pos-0".into()));
        tracker.set_offset(Some("pos-1".into()));

        assert_eq!(tracker.offset(), Some("pos-0".into()));
        tracker.commit();
        assert_eq!(tracker.offset(), Some("pos-1".into()));
    }

    #[test]
    fn test_commit_without_staged_offset_keeps_position() {
        let mut tracker = PreviewOffsetTracker::new(Some("pos-0".into()));
        tracker.commit();
        assert_eq!(tracker.offset(), Some("pos-0".into()));
    }

    #[test]
    fn test_staged_offset_is_consumed_by_commit() {
        let mut tracker = PreviewOffsetTracker::new(None);
        tracker.set_offset(Some("pos-1".into()));
        tracker.commit();
        tracker.commit();
        assert_eq!(tracker.offset(), Some("pos-1".into()));
    }
}
