//! CSV output sinks.
//!
//! - **Append**: each batch is normalized and appended as soon as it is
//!   fetched, and the file is synced before the next batch starts. The
//!   header is written only when the file does not exist yet. Rows stay in
//!   batch-completion order. The first write fixes the header; it carries
//!   `Adj Close` whenever that batch reported any adjusted close, even one
//!   equal to `Close`, so later batches with distinct values still fit.
//! - **Bulk**: batches are buffered and written once at the end, normalized
//!   over the whole table and sorted by `(Date, Ticker)`.
//!
//! Opening a sink removes any output left over from an earlier run.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::normalize::normalize_columns;
use super::schema::{ADJ_CLOSE, CLOSE, DATE, DATE_FORMAT, TICKER};
use super::shaper::concat_frames;

/// How rows reach the output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkMode {
    #[default]
    Append,
    Bulk,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write CSV {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("output frame: {0}")]
    Frame(String),
}

/// CSV sink for long-format price frames.
pub struct CsvSink {
    path: PathBuf,
    mode: SinkMode,
    /// Column set pinned by the first append.
    columns: Option<Vec<String>>,
    pending: Vec<DataFrame>,
    rows_written: usize,
}

impl CsvSink {
    /// Open a sink at `path`, deleting any existing file there.
    pub fn create(path: impl Into<PathBuf>, mode: SinkMode) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SinkError::Io {
                action: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        if path.exists() {
            debug!(path = %path.display(), "removing previous output");
            fs::remove_file(&path).map_err(|source| SinkError::Io {
                action: "remove",
                path: path.clone(),
                source,
            })?;
        }

        Ok(Self {
            path,
            mode,
            columns: None,
            pending: Vec::new(),
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand one batch of long-format frames to the sink.
    ///
    /// Returns the number of rows accepted. In append mode they are on disk
    /// when this returns.
    pub fn write_batch(&mut self, frames: &[DataFrame]) -> Result<usize, SinkError> {
        let Some(batch) = concat_frames(frames).map_err(|e| SinkError::Frame(e.to_string()))?
        else {
            return Ok(0);
        };
        let rows = batch.height();

        match self.mode {
            SinkMode::Bulk => self.pending.push(batch),
            SinkMode::Append => {
                let reports_adj = batch
                    .column(ADJ_CLOSE)
                    .is_ok_and(|c| c.null_count() < c.len());
                let normalized =
                    normalize_columns(&batch).map_err(|e| SinkError::Frame(e.to_string()))?;
                let mut projected = self.project(normalized, reports_adj)?;
                self.append(&mut projected)?;
                self.rows_written += rows;
            }
        }
        Ok(rows)
    }

    /// Flush buffered rows (bulk mode) and return the total rows written.
    pub fn finish(mut self) -> Result<usize, SinkError> {
        if self.mode == SinkMode::Bulk {
            let pending = std::mem::take(&mut self.pending);
            if let Some(table) =
                concat_frames(&pending).map_err(|e| SinkError::Frame(e.to_string()))?
            {
                let normalized =
                    normalize_columns(&table).map_err(|e| SinkError::Frame(e.to_string()))?;
                let mut sorted = normalized
                    .sort([DATE, TICKER], SortMultipleOptions::default())
                    .map_err(|e| SinkError::Frame(format!("sort: {e}")))?;
                self.write_new(&mut sorted)?;
                self.rows_written = sorted.height();
            }
        }
        Ok(self.rows_written)
    }

    /// Fit a batch to the column set of the first append.
    ///
    /// `reports_adj` says whether the batch carried a non-null `Adj Close`
    /// before normalization.
    fn project(
        &mut self,
        mut frame: DataFrame,
        reports_adj: bool,
    ) -> Result<DataFrame, SinkError> {
        let columns = match &self.columns {
            Some(columns) => columns.clone(),
            None => {
                let mut columns: Vec<String> = frame
                    .get_column_names()
                    .iter()
                    .map(|name| name.to_string())
                    .collect();
                if reports_adj && !columns.iter().any(|c| c == ADJ_CLOSE) {
                    columns.push(ADJ_CLOSE.to_string());
                }
                self.columns = Some(columns.clone());
                columns
            }
        };

        let pinned_adj = columns.iter().any(|c| c == ADJ_CLOSE);
        let has_adj = frame.column(ADJ_CLOSE).is_ok();
        if pinned_adj && !has_adj {
            // Adj Close is only elided when it equals Close.
            let filled = frame
                .column(CLOSE)
                .map_err(|e| SinkError::Frame(format!("fill {ADJ_CLOSE}: {e}")))?
                .clone()
                .with_name(ADJ_CLOSE.into());
            frame
                .with_column(filled)
                .map_err(|e| SinkError::Frame(format!("fill {ADJ_CLOSE}: {e}")))?;
        } else if !pinned_adj && has_adj {
            return Err(SinkError::Write {
                path: self.path.clone(),
                message: format!(
                    "batch carries a distinct {ADJ_CLOSE} but the file header was written without one"
                ),
            });
        }

        frame
            .select(columns.iter().map(String::as_str))
            .map_err(|e| SinkError::Frame(format!("project onto header: {e}")))
    }

    fn append(&self, frame: &mut DataFrame) -> Result<(), SinkError> {
        let write_header = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| SinkError::Io {
                action: "open",
                path: self.path.clone(),
                source,
            })?;

        CsvWriter::new(&mut file)
            .include_header(write_header)
            .with_date_format(Some(DATE_FORMAT.into()))
            .finish(frame)
            .map_err(|e| SinkError::Write {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        file.sync_all().map_err(|source| SinkError::Io {
            action: "sync",
            path: self.path.clone(),
            source,
        })
    }

    fn write_new(&self, frame: &mut DataFrame) -> Result<(), SinkError> {
        let mut file = fs::File::create(&self.path).map_err(|source| SinkError::Io {
            action: "create",
            path: self.path.clone(),
            source,
        })?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_date_format(Some(DATE_FORMAT.into()))
            .finish(frame)
            .map_err(|e| SinkError::Write {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }
}
