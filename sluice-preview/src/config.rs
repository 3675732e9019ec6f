//! Preview run configuration

use sluice_core::{Error, Result};

/// Configuration for a preview run
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline revision identifier
    pub rev: String,

    /// Maximum records per batch
    pub batch_size: usize,

    /// Number of batches to execute. Preview intentionally ignores
    /// end-of-source signals and always attempts this count. Zero is
    /// allowed and produces no output.
    pub batches: usize,

    /// Suppress execution of target and executor stages
    pub skip_targets: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            name: "preview".to_string(),
            rev: "0".to_string(),
            batch_size: 1000,
            batches: 1,
            skip_targets: false,
        }
    }
}

impl PreviewConfig {
    /// Check for values the runner cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Runtime("batch size must be positive".to_string()));
        }
        Ok(())
    }
}
