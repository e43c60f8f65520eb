//! Universe file: sector-organized ticker lists.
//!
//! The universe is stored as a TOML file mapping GICS sectors to their
//! member tickers. It serves as the local membership source tried before the
//! reference page, and `sectors --universe-out` writes one from the page.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::provider::{DataError, MembershipProvider};
use super::sectors::SectorEntry;

/// The complete universe configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    /// Load a universe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Universe(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse a universe from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        toml::from_str(content).map_err(|e| DataError::Universe(format!("parse universe TOML: {e}")))
    }

    /// Group sector lookup entries into a universe, keeping entry order
    /// within each sector.
    pub fn from_entries(entries: &[SectorEntry]) -> Self {
        let mut sectors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in entries {
            sectors
                .entry(entry.sector.clone())
                .or_default()
                .push(entry.ticker.clone());
        }
        Self { sectors }
    }

    /// All tickers, sector by sector.
    pub fn all_tickers(&self) -> Vec<&str> {
        self.sectors
            .values()
            .flat_map(|tickers| tickers.iter().map(|t| t.as_str()))
            .collect()
    }

    /// Total number of tickers.
    pub fn ticker_count(&self) -> usize {
        self.sectors.values().map(|v| v.len()).sum()
    }

    /// Serialize the universe to TOML.
    pub fn to_toml(&self) -> Result<String, DataError> {
        toml::to_string_pretty(self).map_err(|e| DataError::Universe(format!("serialize universe: {e}")))
    }

    /// Write the universe as TOML to `path`.
    pub fn write_file(&self, path: &Path) -> Result<(), DataError> {
        let content = self.to_toml()?;
        std::fs::write(path, content)
            .map_err(|e| DataError::Universe(format!("write {}: {e}", path.display())))
    }
}

/// Membership source backed by a universe file on disk.
pub struct UniverseFile {
    path: PathBuf,
}

impl UniverseFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MembershipProvider for UniverseFile {
    fn name(&self) -> &str {
        "universe_file"
    }

    fn members(&self) -> Result<Vec<String>, DataError> {
        let universe = Universe::from_file(&self.path)?;
        Ok(universe.all_tickers().into_iter().map(String::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[sectors]
"Information Technology" = ["AAPL", "MSFT"]
Financials = ["BRK.B", "JPM"]
"#;

    fn entry(ticker: &str, sector: &str) -> SectorEntry {
        SectorEntry {
            ticker: ticker.into(),
            sector: sector.into(),
        }
    }

    #[test]
    fn parses_sector_lists() {
        let u = Universe::from_toml(SAMPLE).unwrap();
        assert_eq!(u.ticker_count(), 4);
        assert_eq!(u.all_tickers(), vec!["BRK.B", "JPM", "AAPL", "MSFT"]);
        assert_eq!(u.sectors["Financials"], vec!["BRK.B", "JPM"]);
    }

    #[test]
    fn toml_roundtrip() {
        let u = Universe::from_entries(&[
            entry("MMM", "Industrials"),
            entry("AOS", "Industrials"),
            entry("ABT", "Health Care"),
        ]);
        let parsed = Universe::from_toml(&u.to_toml().unwrap()).unwrap();
        assert_eq!(u, parsed);
        assert_eq!(parsed.sectors["Industrials"], vec!["MMM", "AOS"]);
    }

    #[test]
    fn file_source_reads_members() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("universe.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let members = UniverseFile::new(&path).members().unwrap();
        assert_eq!(members.len(), 4);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = UniverseFile::new("/nonexistent/universe.toml")
            .members()
            .unwrap_err();
        assert!(matches!(err, DataError::Universe(_)));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Universe::from_toml("sectors = 3").is_err());
    }
}
