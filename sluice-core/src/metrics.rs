//! In-process metrics primitives for pipeline runners

use std::collections::HashMap;
use std::time::Duration;

/// Accumulating timer: update count, total and maximum observed duration
#[derive(Debug, Default, Clone)]
pub struct Timer {
    count: u64,
    total: Duration,
    max: Duration,
}

impl Timer {
    /// Record one observation
    pub fn update(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        if elapsed > self.max {
            self.max = elapsed;
        }
    }

    /// Number of recorded observations
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of all recorded durations
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Largest recorded duration
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Mean duration per observation, zero when nothing was recorded
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.total / n,
        }
    }
}

/// Registry of named timers owned by a single runner
#[derive(Debug, Default)]
pub struct MetricRegistry {
    timers: HashMap<String, Timer>,
}

impl MetricRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the named timer
    pub fn timer(&mut self, name: &str) -> &mut Timer {
        self.timers.entry(name.to_string()).or_default()
    }

    /// Look up a timer without creating it
    pub fn get_timer(&self, name: &str) -> Option<&Timer> {
        self.timers.get(name)
    }

    /// Number of registered timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timers are registered
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

/// Canonical name of the per-batch processing timer for a pipeline
pub fn processing_timer_name(name: &str, rev: &str) -> String {
    format!("pipeline.batchProcessing.{name}.{rev}")
}
