//! barharvest CLI: index constituent price downloads.
//!
//! Commands:
//! - `download`: resolve the index membership, fetch daily bars in batches,
//!   and write them to CSV
//! - `sectors`: write the `Ticker,Sector` lookup from the reference page
//! - `tickers`: print the resolved symbol list without downloading

use anyhow::{Context, Result};
use barharvest_core::data::{SinkMode, StdoutProgress};
use barharvest_core::{export_sectors, run_download, MembershipChain, PipelineConfig};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "barharvest",
    about = "barharvest: daily OHLCV history for index constituents"
)]
struct Cli {
    /// TOML config file. Flags override values from the file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily bars for every index member into one CSV file.
    Download(DownloadArgs),
    /// Write the Ticker,Sector lookup from the reference page.
    Sectors {
        /// Output CSV path.
        #[arg(long, default_value = "sectors.csv")]
        output: PathBuf,

        /// Also write the membership, grouped by sector, as a universe TOML file.
        #[arg(long)]
        universe_out: Option<PathBuf>,
    },
    /// Print the resolved symbol list.
    Tickers {
        /// Local universe file tried before the reference page.
        #[arg(long)]
        universe: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct DownloadArgs {
    /// Start date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD), exclusive.
    #[arg(long)]
    end: Option<String>,

    /// Symbols per provider request.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Attempts per batch (and per symbol in the final pass).
    #[arg(long)]
    max_retries: Option<u32>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// First backoff delay in seconds; doubles each further attempt.
    #[arg(long)]
    backoff: Option<f64>,

    /// Output CSV path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Append each batch as it completes, or write once sorted at the end.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Local universe file tried before the reference page.
    #[arg(long)]
    universe: Option<PathBuf>,

    /// Request the symbols of a batch in parallel.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Keep raw prices plus a separate Adj Close instead of adjusting OHLC.
    #[arg(long, default_value_t = false)]
    no_auto_adjust: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Append,
    Bulk,
}

impl From<ModeArg> for SinkMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Append => SinkMode::Append,
            ModeArg::Bulk => SinkMode::Bulk,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("barharvest=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Download(args) => run_download_cmd(config, args),
        Commands::Sectors {
            output,
            universe_out,
        } => {
            let count = export_sectors(&config, &output, universe_out.as_deref())?;
            println!("Wrote {count} tickers to {}", output.display());
            Ok(())
        }
        Commands::Tickers { universe } => {
            let config = PipelineConfig {
                universe_path: universe.or(config.universe_path),
                ..config
            };
            let symbols = MembershipChain::from_config(&config)?.resolve()?;
            for symbol in &symbols {
                println!("{symbol}");
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_download_cmd(mut config: PipelineConfig, args: DownloadArgs) -> Result<()> {
    if let Some(start) = args.start.as_deref() {
        config.start = parse_date(start)?;
    }
    if let Some(end) = args.end.as_deref() {
        config.end = parse_date(end)?;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(backoff) = args.backoff {
        config.backoff_base_secs = backoff;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }
    if let Some(mode) = args.mode {
        config.sink_mode = mode.into();
    }
    if let Some(universe) = args.universe {
        config.universe_path = Some(universe);
    }
    config.parallel_requests |= args.parallel;
    if args.no_auto_adjust {
        config.auto_adjust = false;
    }
    tracing::debug!(?config, "resolved config");

    // Per-symbol failures are listed by the progress reporter and do not
    // change the exit code.
    run_download(&config, &StdoutProgress::new(config.sink_mode))?;
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}
