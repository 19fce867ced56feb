use futures_util::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};

use super::{CancelFlag, CheckpointSink, Enricher};
use crate::store::{self, Record};

/// Counts gathered over one scheduler run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Batches fully processed
    pub batches: usize,

    /// Records enriched successfully
    pub succeeded: usize,

    /// Records whose enrichment returned an error
    pub failed: usize,

    /// Records without the required input field
    pub skipped_missing_input: usize,

    /// Records that already carried the output
    pub skipped_complete: usize,

    /// Checkpoints persisted
    pub checkpoints_written: usize,

    /// Checkpoints that could not be persisted
    pub checkpoint_failures: usize,

    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
}

/// Drives an enricher over a record sequence in fixed-size, strictly sequential batches
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    start_index: usize,
    cancel: CancelFlag,
    show_progress: bool,
}

impl BatchScheduler {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            start_index: 0,
            cancel: CancelFlag::new(),
            show_progress: false,
        }
    }

    /// Skip the records before `index`, resuming an interrupted run
    pub fn start_at(mut self, index: usize) -> Self {
        self.start_index = index;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Enrich every eligible record from `start_index` on.
    ///
    /// All tasks of a batch finish before the next batch starts, and the sink receives the
    /// whole sequence after every batch. Task failures and checkpoint failures are counted,
    /// never propagated.
    pub async fn run<E, C>(&self, records: &mut [Record], enricher: &E, sink: &C) -> RunSummary
    where
        E: Enricher + ?Sized,
        C: CheckpointSink + ?Sized,
    {
        let total = records.len();
        let start = self.start_index.min(total);
        let mut summary = RunSummary::default();

        tracing::info!(
            "Starting {} from item {} out of {} items",
            enricher.name(),
            start + 1,
            total
        );
        let progress = self.progress_bar((total - start) as u64);

        let mut batch_start = start;
        while batch_start < total {
            if self.cancel.is_cancelled() {
                tracing::warn!("Cancelled before item {}, stopping", batch_start + 1);
                summary.cancelled = true;
                break;
            }

            let batch_end = (batch_start + self.batch_size).min(total);
            let mut tasks = Vec::with_capacity(batch_end - batch_start);

            for (offset, record) in records[batch_start..batch_end].iter_mut().enumerate() {
                let index = batch_start + offset;
                let label = store::label(record, enricher.label_field()).to_string();

                if !enricher.has_input(record) {
                    tracing::warn!("No input for item {} ({}), skipping", index + 1, label);
                    summary.skipped_missing_input += 1;
                    progress.inc(1);
                    continue;
                }
                if enricher.is_complete(record) {
                    tracing::debug!("Item {} ({}) already done, skipping", index + 1, label);
                    summary.skipped_complete += 1;
                    progress.inc(1);
                    continue;
                }

                let progress = &progress;
                tasks.push(async move {
                    tracing::info!("Processing item {}/{}: {}", index + 1, total, label);
                    let outcome = enricher.enrich(record).await;
                    progress.inc(1);
                    (index, label, outcome)
                });
            }

            for (index, label, outcome) in join_all(tasks).await {
                match outcome {
                    Ok(()) => summary.succeeded += 1,
                    Err(e) => {
                        tracing::warn!("Could not {} item {} ({}): {}", enricher.name(), index + 1, label, e);
                        summary.failed += 1;
                    }
                }
            }
            summary.batches += 1;

            match sink.write(records) {
                Ok(()) => {
                    summary.checkpoints_written += 1;
                    tracing::info!(
                        "Saved progress: {} items enriched, {} items remaining",
                        summary.succeeded,
                        total - batch_end
                    );
                }
                Err(e) => {
                    summary.checkpoint_failures += 1;
                    tracing::error!("Failed to save checkpoint: {}", e);
                }
            }

            batch_start = batch_end;
        }

        progress.finish_and_clear();
        tracing::info!(
            "Finished {}: {} succeeded, {} failed, {} without input, {} already done",
            enricher.name(),
            summary.succeeded,
            summary.failed,
            summary.skipped_missing_input,
            summary.skipped_complete
        );
        summary
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress.set_style(style);
        progress
    }
}
