//! Batched fetching with shrinking retries and exponential backoff.
//!
//! Each attempt re-requests only the symbols that are still failing. A
//! transport error fails the whole sub-batch for that attempt; an empty or
//! unshapeable slice fails just that symbol. Neither is raised: whatever is
//! still failing after the last attempt is handed back to the caller.

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::PriceProvider;
use super::shaper::shape_response;

/// Split `items` into consecutive groups of at most `size` (the last may be
/// shorter). A size of zero is treated as one.
pub fn partition<T>(items: &[T], size: usize) -> Vec<&[T]> {
    items.chunks(size.max(1)).collect()
}

/// Attempt budget and backoff schedule for one fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Delay after a failed `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

/// Blocking pause between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Result of fetching one batch.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// One long-format frame per accepted symbol, in acceptance order.
    pub frames: Vec<DataFrame>,
    /// Symbols still failing once the attempt budget is spent.
    pub still_failed: Vec<String>,
    /// Number of provider requests made.
    pub attempts: u32,
}

impl FetchOutcome {
    pub fn row_count(&self) -> usize {
        self.frames.iter().map(DataFrame::height).sum()
    }

    /// True when every requested symbol was accepted.
    pub fn is_complete(&self) -> bool {
        self.still_failed.is_empty()
    }
}

/// Fetches batches of symbols over a fixed date range.
pub struct BatchFetcher<'a> {
    provider: &'a dyn PriceProvider,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
    start: NaiveDate,
    end: NaiveDate,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(
        provider: &'a dyn PriceProvider,
        sleeper: &'a dyn Sleeper,
        policy: RetryPolicy,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            provider,
            sleeper,
            policy,
            start,
            end,
        }
    }

    /// Fetch `symbols`, retrying only the failing ones.
    pub fn fetch(&self, symbols: &[String]) -> FetchOutcome {
        let mut outcome = FetchOutcome {
            still_failed: symbols.to_vec(),
            ..FetchOutcome::default()
        };

        for attempt in 1..=self.policy.max_retries {
            if outcome.still_failed.is_empty() {
                break;
            }
            outcome.attempts = attempt;

            let requested = std::mem::take(&mut outcome.still_failed);
            match self.provider.fetch(&requested, self.start, self.end) {
                Ok(response) => {
                    for (symbol, shaped) in shape_response(&requested, &response) {
                        match shaped {
                            Ok(frame) if frame.height() > 0 => outcome.frames.push(frame),
                            Ok(_) => {
                                debug!(%symbol, attempt, "empty slice");
                                outcome.still_failed.push(symbol);
                            }
                            Err(e) => {
                                debug!(%symbol, attempt, error = %e, "slice extraction failed");
                                outcome.still_failed.push(symbol);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        symbols = requested.len(),
                        error = %e,
                        "request failed"
                    );
                    outcome.still_failed = requested;
                }
            }

            if !outcome.still_failed.is_empty() && attempt < self.policy.max_retries {
                let delay = self.policy.delay_after(attempt);
                debug!(
                    attempt,
                    failing = outcome.still_failed.len(),
                    delay_ms = delay.as_millis() as u64,
                    "backing off"
                );
                self.sleeper.sleep(delay);
            }
        }

        outcome
    }
}
