//! Download orchestrator: batches, sink hand-off, and the last-resort pass.
//!
//! Symbols are fetched in partition order. Each batch's rows go to the sink
//! before the next batch starts; symbols that exhaust their batch retries go
//! into a [`FailureLedger`] that is threaded through the loop. Once every
//! batch is done, each ledger symbol is fetched on its own.

use std::path::PathBuf;
use tracing::info;

use super::fetcher::{partition, BatchFetcher};
use super::provider::DownloadProgress;
use super::sink::{CsvSink, SinkError};

/// Symbols that exhausted their batch-level retries, in failure order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureLedger {
    symbols: Vec<String>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch's leftovers.
    pub fn record(mut self, failed: &[String]) -> Self {
        self.symbols.extend_from_slice(failed);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn into_symbols(self) -> Vec<String> {
        self.symbols
    }
}

/// Summary of a whole download run.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSummary {
    pub total_symbols: usize,
    pub batches: usize,
    pub rows_written: usize,
    /// Symbols that failed their batch but came back one at a time.
    pub recovered: Vec<String>,
    /// Symbols that failed every attempt.
    pub unrecoverable: Vec<String>,
    pub output_path: PathBuf,
}

impl DownloadSummary {
    pub fn succeeded(&self) -> usize {
        self.total_symbols - self.unrecoverable.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.unrecoverable.is_empty()
    }
}

/// Fetch every batch, sink its rows, and return the failures.
pub fn download_batches(
    symbols: &[String],
    batch_size: usize,
    fetcher: &BatchFetcher<'_>,
    sink: &mut CsvSink,
    progress: &dyn DownloadProgress,
) -> Result<FailureLedger, SinkError> {
    let batches = partition(symbols, batch_size);
    let total = batches.len();

    batches
        .into_iter()
        .enumerate()
        .try_fold(FailureLedger::new(), |ledger, (index, batch)| {
            progress.on_batch_start(index, total, batch.len());
            let outcome = fetcher.fetch(batch);
            let rows = sink.write_batch(&outcome.frames)?;
            progress.on_batch_complete(index, rows, &outcome.still_failed);
            Ok(ledger.record(&outcome.still_failed))
        })
}

/// Retry each ledger symbol alone. Returns `(recovered, unrecoverable)`.
pub fn retry_individually(
    ledger: FailureLedger,
    fetcher: &BatchFetcher<'_>,
    sink: &mut CsvSink,
    progress: &dyn DownloadProgress,
) -> Result<(Vec<String>, Vec<String>), SinkError> {
    let mut recovered = Vec::new();
    let mut unrecoverable = Vec::new();
    if ledger.is_empty() {
        return Ok((recovered, unrecoverable));
    }

    progress.on_individual_pass(ledger.len());
    for symbol in ledger.into_symbols() {
        let outcome = fetcher.fetch(std::slice::from_ref(&symbol));
        if outcome.is_complete() && outcome.row_count() > 0 {
            let rows = sink.write_batch(&outcome.frames)?;
            progress.on_recovered(&symbol, rows);
            recovered.push(symbol);
        } else {
            unrecoverable.push(symbol);
        }
    }
    Ok((recovered, unrecoverable))
}

/// Run the batch loop and the one-by-one pass, then close the sink.
///
/// Only sink failures are returned as errors; symbols that never download
/// are listed in the summary.
pub fn download_universe(
    symbols: &[String],
    batch_size: usize,
    fetcher: &BatchFetcher<'_>,
    mut sink: CsvSink,
    progress: &dyn DownloadProgress,
) -> Result<DownloadSummary, SinkError> {
    let ledger = download_batches(symbols, batch_size, fetcher, &mut sink, progress)?;
    info!(failed = ledger.len(), symbols = ?ledger.symbols(), "batch pass finished");

    let (recovered, unrecoverable) = retry_individually(ledger, fetcher, &mut sink, progress)?;

    let output_path = sink.path().to_path_buf();
    let rows_written = sink.finish()?;

    let summary = DownloadSummary {
        total_symbols: symbols.len(),
        batches: symbols.len().div_ceil(batch_size.max(1)),
        rows_written,
        recovered,
        unrecoverable,
        output_path,
    };
    progress.on_finish(&summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_accumulates_in_order() {
        let ledger = FailureLedger::new()
            .record(&["B".to_string()])
            .record(&[])
            .record(&["A".to_string(), "C".to_string()]);
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.symbols(), ["B", "A", "C"]);
    }

    #[test]
    fn summary_counts_successes() {
        let summary = DownloadSummary {
            total_symbols: 5,
            batches: 2,
            rows_written: 40,
            recovered: vec!["A".into()],
            unrecoverable: vec!["Z".into()],
            output_path: PathBuf::from("out.csv"),
        };
        assert_eq!(summary.succeeded(), 4);
        assert!(!summary.all_succeeded());
    }
}
