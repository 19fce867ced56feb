use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::store::Record;
use crate::Result;

pub mod checkpoint;
pub mod gate;
pub mod retry;
pub mod scheduler;

pub use checkpoint::{CheckpointSink, JsonCheckpoint};
pub use gate::CallGate;
pub use retry::RetryPolicy;
pub use scheduler::{BatchScheduler, RunSummary};

/// A per-record operation that derives new fields from an external service
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Short name used in progress messages
    fn name(&self) -> &'static str;

    /// Field holding the record's human-readable label
    fn label_field(&self) -> &'static str;

    /// Whether the record carries the input this enricher needs
    fn has_input(&self, record: &Record) -> bool;

    /// Whether the record already carries this enricher's output
    fn is_complete(&self, _record: &Record) -> bool {
        false
    }

    /// Derive and attach the new fields.
    ///
    /// On error the record is left without the new fields, except where a variant
    /// documents a fallback value.
    async fn enrich(&self, record: &mut Record) -> Result<()>;
}

/// Cooperative cancellation checked by the scheduler between batches
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancel on the first `interrupt`, then call `abort` on the second.
    ///
    /// `interrupt` resolves to `false` when no further signal can arrive.
    pub async fn watch<F, Fut, A>(&self, mut interrupt: F, abort: A)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
        A: FnOnce(),
    {
        if !interrupt().await {
            return;
        }
        tracing::warn!("Interrupt received, stopping after the current batch (press again to abort)");
        self.cancel();

        if interrupt().await {
            tracing::error!("Second interrupt received, aborting");
            abort();
        }
    }
}
