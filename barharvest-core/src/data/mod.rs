//! Membership resolution, price fetching, shaping, and CSV output

pub mod download;
pub mod fetcher;
pub mod identifiers;
pub mod normalize;
pub mod provider;
pub mod reference;
pub mod schema;
pub mod sectors;
pub mod shaper;
pub mod sink;
pub mod universe;
pub mod yahoo;

pub use download::{download_universe, DownloadSummary, FailureLedger};
pub use fetcher::{partition, BatchFetcher, FetchOutcome, RetryPolicy, Sleeper, ThreadSleeper};
pub use identifiers::{normalize_symbol, resolve_identifiers, SourceError};
pub use normalize::normalize_columns;
pub use provider::{
    DataError, DownloadProgress, MembershipProvider, PriceProvider, PriceResponse, RawBar,
    StdoutProgress,
};
pub use reference::{ReferenceDocument, ReferenceTable};
pub use sectors::SectorEntry;
pub use sink::{CsvSink, SinkError, SinkMode};
pub use universe::{Universe, UniverseFile};
pub use yahoo::YahooProvider;
