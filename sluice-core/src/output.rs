//! Captured stage output for a single batch

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Output records grouped by output lane
pub type Lanes = BTreeMap<String, Vec<Record>>;

/// The output one stage produced, or was assigned, for one batch.
///
/// Immutable once constructed. Keyed by the producing stage's instance name,
/// which is also the identity used for overrides and skips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// Instance name of the producing stage
    instance: String,

    /// Records grouped by output lane
    lanes: Lanes,
}

impl StageOutput {
    /// Create a new stage output
    pub fn new(instance: impl Into<String>, lanes: Lanes) -> Self {
        Self {
            instance: instance.into(),
            lanes,
        }
    }

    /// Create output for a stage with a single output lane
    pub fn single_lane(
        instance: impl Into<String>,
        lane: impl Into<String>,
        records: Vec<Record>,
    ) -> Self {
        let mut lanes = Lanes::new();
        lanes.insert(lane.into(), records);
        Self::new(instance, lanes)
    }

    /// Instance name of the producing stage
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// All lanes of this output
    pub fn lanes(&self) -> &Lanes {
        &self.lanes
    }

    /// Records in one lane, if the lane exists
    pub fn lane(&self, name: &str) -> Option<&[Record]> {
        self.lanes.get(name).map(Vec::as_slice)
    }

    /// Total number of records across all lanes
    pub fn record_count(&self) -> usize {
        self.lanes.values().map(Vec::len).sum()
    }
}
