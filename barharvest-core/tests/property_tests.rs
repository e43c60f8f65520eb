//! Property tests for fetch and normalization invariants.
//!
//! Uses proptest to verify:
//! 1. Partition completeness: batches concatenate back to the input
//! 2. Retry termination: a fetch never exceeds its attempt budget
//! 3. Shrinking: each attempt re-requests exactly what failed before it
//! 4. Normalization: idempotent, and Adj Close survives only when it differs

use chrono::NaiveDate;
use polars::prelude::DataFrame;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use barharvest_core::data::shaper::bars_to_frame;
use barharvest_core::data::{
    normalize_columns, partition, BatchFetcher, DataError, PriceProvider, PriceResponse, RawBar,
    RetryPolicy, ThreadSleeper,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_symbols() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[A-Z]{1,4}", 0..30).prop_map(|set| set.into_iter().collect())
}

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0), 1..20)
}

fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset as i64)
}

fn frame_with(closes: &[f64], adj: &[Option<f64>]) -> DataFrame {
    let bars: Vec<RawBar> = closes
        .iter()
        .zip(adj)
        .enumerate()
        .map(|(i, (close, adj_close))| RawBar {
            date: day(i),
            open: *close,
            high: *close + 1.0,
            low: *close - 0.5,
            close: *close,
            volume: 100,
            adj_close: *adj_close,
        })
        .collect();
    bars_to_frame("TEST", &bars).unwrap()
}

/// Answers each symbol with data on a fixed, per-symbol attempt number
/// (zero means never), or fails the whole request at transport level.
struct Scripted {
    ready_on: BTreeMap<String, u32>,
    fail_transport_on: HashSet<u32>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl PriceProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(
        &self,
        symbols: &[String],
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<PriceResponse, DataError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(symbols.to_vec());
        let attempt = requests.len() as u32;
        if self.fail_transport_on.contains(&attempt) {
            return Err(DataError::NetworkUnreachable("scripted".into()));
        }

        let tables = symbols
            .iter()
            .map(|s| {
                let ready = self
                    .ready_on
                    .get(s)
                    .is_some_and(|r| *r != 0 && attempt >= *r);
                let bars = if ready {
                    vec![RawBar {
                        date: day(1),
                        open: 1.0,
                        high: 1.0,
                        low: 1.0,
                        close: 1.0,
                        volume: 1,
                        adj_close: None,
                    }]
                } else {
                    Vec::new()
                };
                (s.clone(), bars)
            })
            .collect();
        Ok(PriceResponse::Grouped(tables))
    }
}

fn arb_script() -> impl Strategy<Value = (Vec<(String, u32)>, HashSet<u32>, u32)> {
    (
        prop::collection::btree_map("[A-Z]{1,4}", 0..6u32, 1..12),
        prop::collection::hash_set(1..8u32, 0..3),
        1..6u32,
    )
        .prop_map(|(ready, transport, retries)| (ready.into_iter().collect(), transport, retries))
}

// ── 1. Partition completeness ────────────────────────────────────────

proptest! {
    #[test]
    fn partition_is_complete_and_bounded(symbols in arb_symbols(), size in 0..50usize) {
        let batches = partition(&symbols, size);
        let bound = size.max(1);

        prop_assert_eq!(batches.concat(), symbols.clone());
        prop_assert_eq!(batches.len(), symbols.len().div_ceil(bound));
        for batch in &batches {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.len() <= bound);
        }
        if let Some((last, full)) = batches.split_last() {
            prop_assert!(full.iter().all(|b| b.len() == bound));
            prop_assert!(last.len() <= bound);
        }
    }
}

// ── 2-3. Retry termination and shrinking ─────────────────────────────

proptest! {
    #[test]
    fn fetch_terminates_and_shrinks((ready, transport, retries) in arb_script()) {
        let symbols: Vec<String> = ready.iter().map(|(s, _)| s.clone()).collect();
        let ready_on: BTreeMap<String, u32> = ready.into_iter().collect();
        let provider = Scripted {
            ready_on: ready_on.clone(),
            fail_transport_on: transport.clone(),
            requests: Mutex::new(Vec::new()),
        };
        let fetcher = BatchFetcher::new(
            &provider,
            &ThreadSleeper,
            RetryPolicy::new(retries, Duration::ZERO),
            day(0),
            day(30),
        );

        let outcome = fetcher.fetch(&symbols);
        let requests = provider.requests.lock().unwrap();

        prop_assert!(outcome.attempts <= retries);
        prop_assert_eq!(requests.len() as u32, outcome.attempts);
        prop_assert_eq!(requests.first(), Some(&symbols));

        // Each attempt re-requests exactly what the one before left failing.
        for (i, pair) in requests.windows(2).enumerate() {
            let attempt = i as u32 + 1;
            let expected: Vec<String> = if transport.contains(&attempt) {
                pair[0].clone()
            } else {
                pair[0]
                    .iter()
                    .filter(|s| !ready_on.get(*s).is_some_and(|r| *r != 0 && attempt >= *r))
                    .cloned()
                    .collect()
            };
            prop_assert_eq!(&pair[1], &expected);
        }

        // Every symbol is either delivered or still failing, never both.
        let delivered: HashSet<String> = outcome
            .frames
            .iter()
            .map(|f| {
                f.column("Ticker").unwrap().str().unwrap().get(0).unwrap().to_string()
            })
            .collect();
        let failed: HashSet<String> = outcome.still_failed.iter().cloned().collect();
        prop_assert!(delivered.is_disjoint(&failed));
        prop_assert_eq!(delivered.len() + failed.len(), symbols.len());
        prop_assert_eq!(outcome.frames.len(), delivered.len());

        // Stopping early means nothing was left to retry.
        if outcome.attempts < retries {
            prop_assert!(failed.is_empty());
        }
    }
}

// ── 4. Normalization ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn normalization_is_idempotent(
        closes in arb_closes(),
        shift in prop::option::of(0.01..5.0_f64),
    ) {
        let adj: Vec<Option<f64>> = closes.iter().map(|c| shift.map(|s| c - s)).collect();
        let df = frame_with(&closes, &adj);

        let once = normalize_columns(&df).unwrap();
        let twice = normalize_columns(&once).unwrap();
        prop_assert!(once.equals_missing(&twice));
    }

    #[test]
    fn adj_close_elided_iff_identical(
        closes in arb_closes(),
        differ_at in prop::option::of(any::<prop::sample::Index>()),
    ) {
        let mut adj: Vec<Option<f64>> = closes.iter().map(|c| Some(*c)).collect();
        if let Some(idx) = differ_at {
            let i = idx.index(adj.len());
            adj[i] = adj[i].map(|v| v + 0.25);
        }
        let df = frame_with(&closes, &adj);

        let normalized = normalize_columns(&df).unwrap();
        let has_adj = normalized.column("Adj Close").is_ok();
        prop_assert_eq!(has_adj, differ_at.is_some());
        prop_assert_eq!(normalized.height(), df.height());
    }
}
