//! Serializable pipeline configuration.
//!
//! Every key is optional in the TOML file; missing keys take the defaults
//! below. Dates are quoted `YYYY-MM-DD` strings and `end` is exclusive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::data::fetcher::RetryPolicy;
use crate::data::reference::SP500_LIST_URL;
use crate::data::sink::SinkMode;

/// Browser-like user agent; the reference host rejects bare clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All knobs of a download run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// First date requested (inclusive).
    pub start: NaiveDate,
    /// Upper bound of the range (exclusive).
    pub end: NaiveDate,
    pub batch_size: usize,
    /// Attempts per batch, and per symbol in the one-by-one pass.
    pub max_retries: u32,
    pub request_timeout_secs: u64,
    /// First backoff delay; doubles on each further attempt.
    pub backoff_base_secs: f64,
    pub output_path: PathBuf,
    pub sink_mode: SinkMode,
    /// Local membership list tried before the reference page.
    pub universe_path: Option<PathBuf>,
    pub reference_url: String,
    pub symbol_column: String,
    pub sector_column: String,
    pub reference_timeout_secs: u64,
    pub user_agent: String,
    pub parallel_requests: bool,
    /// Fold the adjusted close into OHLC (split/dividend-adjusted prices).
    pub auto_adjust: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2005, 1, 1).expect("valid default start"),
            end: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid default end"),
            batch_size: 40,
            max_retries: 3,
            request_timeout_secs: 30,
            backoff_base_secs: 3.0,
            output_path: PathBuf::from("sp500_ohlcv.csv"),
            sink_mode: SinkMode::Append,
            universe_path: None,
            reference_url: SP500_LIST_URL.to_string(),
            symbol_column: "Symbol".to_string(),
            sector_column: "GICS Sector".to_string(),
            reference_timeout_secs: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            parallel_requests: false,
            auto_adjust: true,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be > 0".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be > 0".into()));
        }
        if self.request_timeout_secs == 0 || self.reference_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be > 0".into()));
        }
        if Duration::try_from_secs_f64(self.backoff_base_secs).is_err() {
            return Err(ConfigError::Invalid(format!(
                "backoff_base_secs must be a non-negative, representable number of seconds, got {}",
                self.backoff_base_secs
            )));
        }
        if self.start >= self.end {
            return Err(ConfigError::Invalid(format!(
                "start ({}) must be before end ({})",
                self.start, self.end
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_path is empty".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::try_from_secs_f64(self.backoff_base_secs).unwrap_or(Duration::MAX),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reference_timeout(&self) -> Duration {
        Duration::from_secs(self.reference_timeout_secs)
    }
}
