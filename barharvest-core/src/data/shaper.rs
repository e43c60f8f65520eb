//! Row shaping: provider responses → long-format frames.
//!
//! Every shaped frame has the [`LongSchema`] columns: the bar date promoted
//! to an explicit `Date` column, the owning symbol repeated in `Ticker`, then
//! OHLCV and a nullable `Adj Close`.

use chrono::Datelike;
use polars::prelude::*;

use super::provider::{DataError, PriceResponse, RawBar};
use super::schema::{self, LongSchema};

/// `NaiveDate::num_days_from_ce()` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Slice a provider response into one frame per requested symbol.
///
/// The result is in request order. A grouped response without an entry for
/// a symbol is an extraction error for that symbol. A flat response belongs
/// to the requested symbol only when exactly one was requested; otherwise it
/// cannot be attributed and every symbol gets an extraction error.
pub fn shape_response(
    requested: &[String],
    response: &PriceResponse,
) -> Vec<(String, Result<DataFrame, DataError>)> {
    match response {
        PriceResponse::Grouped(tables) => requested
            .iter()
            .map(|symbol| {
                let frame = match tables.get(symbol) {
                    Some(bars) => bars_to_frame(symbol, bars),
                    None => Err(DataError::Extraction(format!(
                        "no table for {symbol} in grouped response"
                    ))),
                };
                (symbol.clone(), frame)
            })
            .collect(),
        PriceResponse::Flat(bars) => match requested {
            [symbol] => vec![(symbol.clone(), bars_to_frame(symbol, bars))],
            _ => requested
                .iter()
                .map(|symbol| {
                    (
                        symbol.clone(),
                        Err(DataError::Extraction(format!(
                            "flat response cannot be attributed among {} symbols",
                            requested.len()
                        ))),
                    )
                })
                .collect(),
        },
    }
}

/// Convert one symbol's bars to a long-format frame.
///
/// Bars are ordered by date and a repeated date keeps its first observation,
/// so `(Date, Ticker)` is unique in the result.
pub fn bars_to_frame(symbol: &str, bars: &[RawBar]) -> Result<DataFrame, DataError> {
    let mut bars: Vec<&RawBar> = bars.iter().collect();
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);

    let dates: Vec<i32> = bars
        .iter()
        .map(|b| b.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
        .collect();
    let tickers: Vec<&str> = vec![symbol; bars.len()];
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();
    let adj_closes: Vec<Option<f64>> = bars.iter().map(|b| b.adj_close).collect();

    DataFrame::new(vec![
        Column::new(schema::DATE.into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::Frame(format!("date cast: {e}")))?,
        Column::new(schema::TICKER.into(), tickers),
        Column::new(schema::OPEN.into(), opens),
        Column::new(schema::HIGH.into(), highs),
        Column::new(schema::LOW.into(), lows),
        Column::new(schema::CLOSE.into(), closes),
        Column::new(schema::VOLUME.into(), volumes),
        Column::new(schema::ADJ_CLOSE.into(), adj_closes),
    ])
    .map_err(|e| DataError::Frame(format!("dataframe creation for {symbol}: {e}")))
}

/// Stack long-format frames vertically. `None` when there is nothing to stack.
pub fn concat_frames(frames: &[DataFrame]) -> Result<Option<DataFrame>, DataError> {
    let Some((first, rest)) = frames.split_first() else {
        return Ok(None);
    };

    LongSchema::validate(first).map_err(|e| DataError::Frame(e.to_string()))?;
    let mut stacked = first.clone();
    for frame in rest {
        LongSchema::validate(frame).map_err(|e| DataError::Frame(e.to_string()))?;
        stacked
            .vstack_mut(frame)
            .map_err(|e| DataError::Frame(format!("vstack: {e}")))?;
    }
    Ok(Some(stacked))
}
