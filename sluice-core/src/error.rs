//! Error types for pipeline execution

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// A stage's own computation failed
    #[error("stage '{instance}' failed: {message}")]
    Stage {
        /// Instance name of the failing stage
        instance: String,
        /// Description of the underlying failure
        message: String,
    },

    /// A stage failed while the runner was processing a specific batch
    #[error("stage '{instance}' failed in batch {batch}: {message}")]
    StageInBatch {
        /// Instance name of the failing stage
        instance: String,
        /// Zero-based index of the batch being processed
        batch: usize,
        /// Description of the underlying failure
        message: String,
    },

    /// Structural or orchestration failure in the pipeline runtime
    #[error("pipeline runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Create a stage failure for the given stage instance
    pub fn stage(instance: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Stage {
            instance: instance.into(),
            message: message.into(),
        }
    }

    /// Attach the index of the batch during which this failure surfaced.
    /// Runtime failures pass through unchanged.
    #[must_use]
    pub fn in_batch(self, batch: usize) -> Self {
        match self {
            Error::Stage { instance, message } => Error::StageInBatch {
                instance,
                batch,
                message,
            },
            other => other,
        }
    }

    /// Instance name of the failing stage, if this is a stage failure
    pub fn failing_stage(&self) -> Option<&str> {
        match self {
            Error::Stage { instance, .. } | Error::StageInBatch { instance, .. } => Some(instance),
            Error::Runtime(_) => None,
        }
    }

    /// Index of the batch in which the failure surfaced, if known
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            Error::StageInBatch { batch, .. } => Some(*batch),
            _ => None,
        }
    }
}
