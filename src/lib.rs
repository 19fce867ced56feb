//! Dataset Enricher - checkpointed batch enrichment for accelerator video and blog datasets
//!
//! Every command reads a JSON array of records, derives new fields through an external
//! service (speech-to-text, translation, audio download) and writes the sequence back to
//! disk after every batch so an interrupted run can be resumed.

use std::path::PathBuf;
use std::time::Duration;

pub mod cli;
pub mod config;
pub mod download;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod transcribe;
pub mod translate;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{BatchScheduler, CallGate, CancelFlag, Enricher, RetryPolicy, RunSummary};
pub use store::Record;
pub use transcribe::{Transcript, TranscriptionEnricher};
pub use translate::{Language, Translator};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, EnrichError>;

/// Error types specific to dataset enrichment
#[derive(thiserror::Error, Debug)]
pub enum EnrichError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Malformed dataset {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Record has no usable `{0}` field")]
    MissingInput(String),

    #[error("{0} returned an empty result")]
    EmptyResult(String),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<EnrichError>,
    },

    #[error("{failed} of {total} translation chunks fell back to an error marker")]
    PartialTranslation { failed: usize, total: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EnrichError {
    /// Whether another attempt at the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EnrichError::ExternalService(_)
                | EnrichError::Timeout(_)
                | EnrichError::EmptyResult(_)
                | EnrichError::Io(_)
        )
    }
}
