use std::path::{Path, PathBuf};

use crate::store::{self, Record};
use crate::Result;

/// Destination for periodic snapshots of the record sequence
#[cfg_attr(test, mockall::automock)]
pub trait CheckpointSink: Send + Sync {
    /// Persist the full current sequence
    fn write(&self, records: &[Record]) -> Result<()>;
}

/// Checkpoints written as a complete JSON file, overwritten after every batch
#[derive(Debug, Clone)]
pub struct JsonCheckpoint {
    path: PathBuf,
}

impl JsonCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointSink for JsonCheckpoint {
    fn write(&self, records: &[Record]) -> Result<()> {
        store::save(&self.path, records)?;
        tracing::debug!("Checkpoint written to {}", self.path.display());
        Ok(())
    }
}
