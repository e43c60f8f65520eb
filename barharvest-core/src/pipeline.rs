//! End-to-end wiring: config → membership → batched download → CSV.

use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, PipelineConfig};
use crate::data::download::{download_universe, DownloadSummary};
use crate::data::fetcher::{BatchFetcher, Sleeper, ThreadSleeper};
use crate::data::identifiers::{resolve_identifiers, SourceError};
use crate::data::provider::{DataError, DownloadProgress, MembershipProvider, PriceProvider};
use crate::data::reference::ReferenceDocument;
use crate::data::sectors::{sector_entries, write_sectors_csv};
use crate::data::sink::{CsvSink, SinkError};
use crate::data::universe::{Universe, UniverseFile};
use crate::data::yahoo::YahooProvider;

/// Errors that end a run. Everything per-symbol is reported, not raised.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),

    #[error("sink write failed: {0}")]
    SinkWrite(#[from] SinkError),

    #[error("setup failed: {0}")]
    Setup(DataError),
}

/// Membership strategies in the order they are tried.
pub struct MembershipChain {
    universe: Option<UniverseFile>,
    reference: ReferenceDocument,
}

impl MembershipChain {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let reference = ReferenceDocument::new(
            config.reference_url.clone(),
            config.symbol_column.clone(),
            &config.user_agent,
            config.reference_timeout(),
        )
        .map_err(PipelineError::Setup)?;

        Ok(Self {
            universe: config.universe_path.as_ref().map(UniverseFile::new),
            reference,
        })
    }

    pub fn strategies(&self) -> Vec<&dyn MembershipProvider> {
        let mut strategies: Vec<&dyn MembershipProvider> = Vec::new();
        if let Some(universe) = &self.universe {
            strategies.push(universe);
        }
        strategies.push(&self.reference);
        strategies
    }

    pub fn resolve(&self) -> Result<Vec<String>, SourceError> {
        resolve_identifiers(&self.strategies())
    }
}

/// Run a download with explicit collaborators.
pub fn run_with(
    config: &PipelineConfig,
    strategies: &[&dyn MembershipProvider],
    provider: &dyn PriceProvider,
    sleeper: &dyn Sleeper,
    progress: &dyn DownloadProgress,
) -> Result<DownloadSummary, PipelineError> {
    config.validate()?;

    let symbols = resolve_identifiers(strategies)?;
    progress.on_universe(&symbols);

    let sink = CsvSink::create(&config.output_path, config.sink_mode)?;
    let fetcher = BatchFetcher::new(
        provider,
        sleeper,
        config.retry_policy(),
        config.start,
        config.end,
    );
    info!(
        provider = provider.name(),
        symbols = symbols.len(),
        batch_size = config.batch_size,
        start = %config.start,
        end = %config.end,
        "starting download"
    );

    Ok(download_universe(
        &symbols,
        config.batch_size,
        &fetcher,
        sink,
        progress,
    )?)
}

/// Run a download against the live membership sources and Yahoo Finance.
pub fn run_download(
    config: &PipelineConfig,
    progress: &dyn DownloadProgress,
) -> Result<DownloadSummary, PipelineError> {
    config.validate()?;

    let chain = MembershipChain::from_config(config)?;
    let provider = YahooProvider::new(
        config.request_timeout(),
        &config.user_agent,
        config.parallel_requests,
        config.auto_adjust,
    )
    .map_err(PipelineError::Setup)?;

    run_with(config, &chain.strategies(), &provider, &ThreadSleeper, progress)
}

/// Write the `Ticker,Sector` lookup, and optionally a universe file.
///
/// Returns the number of tickers written.
pub fn export_sectors(
    config: &PipelineConfig,
    output: &Path,
    universe_out: Option<&Path>,
) -> Result<usize, PipelineError> {
    let reference = ReferenceDocument::new(
        config.reference_url.clone(),
        config.symbol_column.clone(),
        &config.user_agent,
        config.reference_timeout(),
    )
    .map_err(PipelineError::Setup)?;

    let table = reference.fetch_table().map_err(|e| SourceError::Unavailable {
        failures: vec![(reference.name().to_string(), e.to_string())],
    })?;
    let entries = sector_entries(&table, &config.symbol_column, &config.sector_column)
        .map_err(|e| SourceError::Unavailable {
            failures: vec![(reference.name().to_string(), e.to_string())],
        })?;

    write_sectors_csv(output, &entries)?;
    info!(path = %output.display(), tickers = entries.len(), "wrote sector lookup");

    if let Some(path) = universe_out {
        let universe = Universe::from_entries(&entries);
        universe.write_file(path).map_err(|e| SinkError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        info!(
            path = %path.display(),
            sectors = universe.sectors.len(),
            tickers = universe.ticker_count(),
            "wrote universe file"
        );
    }

    Ok(entries.len())
}
