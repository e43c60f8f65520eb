//! Ticker → sector lookup extracted from the reference table.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::identifiers::normalize_symbol;
use super::provider::DataError;
use super::reference::ReferenceTable;
use super::sink::SinkError;

/// One row of the sector lookup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorEntry {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Sector")]
    pub sector: String,
}

/// Pair the symbol and sector columns of a reference table.
///
/// Symbols are normalized the same way as the download universe; rows with a
/// blank symbol are skipped.
pub fn sector_entries(
    table: &ReferenceTable,
    symbol_column: &str,
    sector_column: &str,
) -> Result<Vec<SectorEntry>, DataError> {
    let symbols = table.column(symbol_column)?;
    let sectors = table.column(sector_column)?;

    Ok(symbols
        .into_iter()
        .zip(sectors)
        .map(|(symbol, sector)| SectorEntry {
            ticker: normalize_symbol(symbol),
            sector: sector.to_string(),
        })
        .filter(|entry| !entry.ticker.is_empty())
        .collect())
}

/// Write `Ticker,Sector` rows to `path`.
pub fn write_sectors_csv(path: &Path, entries: &[SectorEntry]) -> Result<(), SinkError> {
    let io_err = |e: csv::Error| SinkError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut wtr = csv::Writer::from_path(path).map_err(io_err)?;
    for entry in entries {
        wtr.serialize(entry).map_err(io_err)?;
    }
    wtr.flush().map_err(|source| SinkError::Io {
        action: "flush",
        path: path.to_path_buf(),
        source,
    })
}
