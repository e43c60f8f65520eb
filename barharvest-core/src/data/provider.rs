//! Provider traits and structured error types.
//!
//! Two collaborators sit behind traits so the pipeline can be driven by
//! scripted providers in tests:
//! - [`MembershipProvider`] answers "which symbols make up the index?"
//! - [`PriceProvider`] answers "give me daily bars for these symbols".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::download::DownloadSummary;
use super::sink::SinkMode;

/// Raw daily OHLCV bar from a data provider (before shaping).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Absent when the provider did not report an adjusted close.
    pub adj_close: Option<f64>,
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("universe error: {0}")]
    Universe(String),

    #[error("frame error: {0}")]
    Frame(String),
}

impl DataError {
    /// Whether the error came from the transport rather than the payload.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::HttpStatus { .. }
        )
    }
}

/// What a price provider hands back for one request.
///
/// Multi-symbol requests come back grouped by symbol. A provider may answer a
/// single-symbol request with a plain table that carries no symbol structure
/// at all; the shaper attributes such a table to the one requested symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceResponse {
    Grouped(BTreeMap<String, Vec<RawBar>>),
    Flat(Vec<RawBar>),
}

/// Source of daily price history.
///
/// Implementations may parallelize internally; callers see one blocking call.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for `symbols` over `[start, end)`.
    fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceResponse, DataError>;
}

/// Source of index membership (raw, un-normalized symbols).
pub trait MembershipProvider {
    fn name(&self) -> &str;

    fn members(&self) -> Result<Vec<String>, DataError>;
}

/// Progress callback for a multi-batch download.
pub trait DownloadProgress {
    /// Called once the symbol universe is resolved.
    fn on_universe(&self, symbols: &[String]);

    /// Called before a batch is fetched. `index` is zero-based.
    fn on_batch_start(&self, index: usize, total: usize, size: usize);

    /// Called after a batch's rows are in the sink.
    fn on_batch_complete(&self, index: usize, rows: usize, failed: &[String]);

    /// Called before the one-by-one retry pass.
    fn on_individual_pass(&self, count: usize);

    /// Called for each symbol the one-by-one pass recovered.
    fn on_recovered(&self, symbol: &str, rows: usize);

    /// Called when the whole run is done.
    fn on_finish(&self, summary: &DownloadSummary);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress {
    mode: SinkMode,
}

impl StdoutProgress {
    /// `mode` decides whether finished batches are reported as written or
    /// buffered.
    pub fn new(mode: SinkMode) -> Self {
        Self { mode }
    }

    fn rows_line(&self, rows: usize) -> String {
        match self.mode {
            SinkMode::Append => format!("  -> {rows} rows written"),
            SinkMode::Bulk => format!("  -> {rows} rows buffered"),
        }
    }
}

impl DownloadProgress for StdoutProgress {
    fn on_universe(&self, symbols: &[String]) {
        let sample: Vec<&str> = symbols.iter().take(10).map(String::as_str).collect();
        println!("{} tickers loaded. Sample: {sample:?}", symbols.len());
    }

    fn on_batch_start(&self, index: usize, total: usize, size: usize) {
        println!("[Batch {}/{total}] {size} tickers...", index + 1);
    }

    fn on_batch_complete(&self, _index: usize, rows: usize, failed: &[String]) {
        if rows > 0 {
            println!("{}", self.rows_line(rows));
        }
        if !failed.is_empty() {
            println!("  !! still failing after batch retries: {failed:?}");
        }
    }

    fn on_individual_pass(&self, count: usize) {
        println!("Retrying {count} tickers one at a time...");
    }

    fn on_recovered(&self, symbol: &str, rows: usize) {
        println!("  -> recovered {symbol} ({rows} rows)");
    }

    fn on_finish(&self, summary: &DownloadSummary) {
        println!();
        println!("Output: {}", summary.output_path.display());
        println!(
            "Download complete: {}/{} tickers, {} rows",
            summary.succeeded(),
            summary.total_symbols,
            summary.rows_written
        );
        if !summary.unrecoverable.is_empty() {
            println!(
                "Could not download after retries: {} tickers",
                summary.unrecoverable.len()
            );
            println!("{:?}", summary.unrecoverable);
        }
    }
}
