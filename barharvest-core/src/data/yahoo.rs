//! Yahoo Finance price provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API, one request per
//! symbol. A single-symbol request is answered with a flat table; a
//! multi-symbol request is answered grouped by symbol, containing only the
//! symbols that came back. Retrying is the fetcher's job, so every request
//! here is a single attempt.
//!
//! With auto-adjust on, open/high/low/close are scaled by `adjclose / close`
//! per bar, so prices are split- and dividend-adjusted and no separate
//! adjusted close is reported.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DataError, PriceProvider, PriceResponse, RawBar};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    parallel: bool,
    auto_adjust: bool,
}

impl YahooProvider {
    /// `parallel` fans the symbols of one request out over the rayon pool.
    /// `auto_adjust` folds the adjusted close into the OHLC prices.
    pub fn new(
        timeout: Duration,
        user_agent: &str,
        parallel: bool,
        auto_adjust: bool,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("build HTTP client: {e}")))?;

        Ok(Self {
            client,
            parallel,
            auto_adjust,
        })
    }

    /// Build the chart API URL for a symbol and the range `[start, end)`.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{CHART_BASE_URL}/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// Parse the chart API response into RawBars inside `[start, end)`.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) => DataError::ResponseFormatChanged(format!(
                "{symbol}: {}: {}",
                err.code, err.description
            )),
            None => DataError::ResponseFormatChanged(format!("{symbol}: empty result with no error")),
        })?;

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };

        // No timestamps: the symbol traded nothing in range.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("{symbol}: no quote data")))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;
            if date < start || date >= end {
                continue;
            }

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());

            // Skip bars where all OHLCV are None (holidays/non-trading days)
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            bars.push(RawBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
                adj_close,
            });
        }

        Ok(bars)
    }

    /// One chart request for one symbol.
    fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        let url = Self::chart_url(symbol, start, end);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(format!("{symbol}: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;
        let mut bars = Self::parse_response(symbol, chart, start, end)?;
        if self.auto_adjust {
            adjust_bars(symbol, &mut bars);
        }
        Ok(bars)
    }
}

/// Scale OHLC by `adj_close / close` and fold the adjusted close into
/// `close`. Bars without a usable ratio keep their raw prices.
fn adjust_bars(symbol: &str, bars: &mut [RawBar]) {
    let mut unadjusted = 0usize;
    for bar in bars.iter_mut() {
        match bar.adj_close.take() {
            Some(adj) if adj.is_finite() && bar.close.is_finite() && bar.close != 0.0 => {
                let ratio = adj / bar.close;
                bar.open *= ratio;
                bar.high *= ratio;
                bar.low *= ratio;
                bar.close = adj;
            }
            _ => unadjusted += 1,
        }
    }
    if unadjusted > 0 {
        debug!(%symbol, unadjusted, "bars without an adjustment ratio");
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceResponse, DataError> {
        if let [symbol] = symbols {
            return self.fetch_symbol(symbol, start, end).map(PriceResponse::Flat);
        }

        let fetch = |symbol: &String| (symbol.clone(), self.fetch_symbol(symbol, start, end));
        let results: Vec<(String, Result<Vec<RawBar>, DataError>)> = if self.parallel {
            symbols.par_iter().map(fetch).collect()
        } else {
            symbols.iter().map(fetch).collect()
        };

        if !results.is_empty()
            && results
                .iter()
                .all(|(_, r)| r.as_ref().is_err_and(DataError::is_transport))
        {
            let first = results
                .into_iter()
                .find_map(|(_, r)| r.err())
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(DataError::NetworkUnreachable(format!(
                "all {} requests failed, first: {first}",
                symbols.len()
            )));
        }

        let mut tables = BTreeMap::new();
        for (symbol, result) in results {
            match result {
                Ok(bars) => {
                    tables.insert(symbol, bars);
                }
                Err(e) => debug!(%symbol, error = %e, "symbol request failed"),
            }
        }
        Ok(PriceResponse::Grouped(tables))
    }
}
