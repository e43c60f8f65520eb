//! barharvest core: index membership, batched price downloads, CSV output.
//!
//! This crate contains the download pipeline:
//! - Membership strategies (universe file, reference page) with fallback
//! - Batch fetcher with shrinking retries and exponential backoff
//! - Row shaping into long format, one row per (date, ticker)
//! - Output column normalization and append/bulk CSV sinks
//! - Sector lookup export

pub mod config;
pub mod data;
pub mod pipeline;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{export_sectors, run_download, run_with, MembershipChain, PipelineError};
