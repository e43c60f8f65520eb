//! Output column selection.

use polars::prelude::*;

use super::provider::DataError;
use super::schema::{ADJ_CLOSE, CLOSE, OUTPUT_COLUMNS};

/// Reduce a frame to the output allow-list, in allow-list order.
///
/// Columns outside the allow-list are dropped, missing ones are skipped.
/// `Adj Close` is dropped when it is entirely null or equal to `Close` on
/// every row. Applying this twice gives the same frame as applying it once.
pub fn normalize_columns(df: &DataFrame) -> Result<DataFrame, DataError> {
    let keep: Vec<&str> = OUTPUT_COLUMNS
        .iter()
        .copied()
        .filter(|name| df.column(name).is_ok())
        .collect();

    let selected = df
        .select(keep)
        .map_err(|e| DataError::Frame(format!("select output columns: {e}")))?;

    if adj_close_is_redundant(&selected)? {
        return selected
            .drop(ADJ_CLOSE)
            .map_err(|e| DataError::Frame(format!("drop {ADJ_CLOSE}: {e}")));
    }
    Ok(selected)
}

fn adj_close_is_redundant(df: &DataFrame) -> Result<bool, DataError> {
    let Ok(adj) = df.column(ADJ_CLOSE) else {
        return Ok(false);
    };
    if adj.null_count() == adj.len() {
        return Ok(true);
    }
    let Ok(close) = df.column(CLOSE) else {
        return Ok(false);
    };

    let adj = adj
        .f64()
        .map_err(|e| DataError::Frame(format!("{ADJ_CLOSE} column type: {e}")))?;
    let close = close
        .f64()
        .map_err(|e| DataError::Frame(format!("{CLOSE} column type: {e}")))?;

    Ok(adj.into_iter().zip(close).all(|(a, c)| same_value(a, c)))
}

/// Equality where two NaNs (missing provider fields) match.
fn same_value(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
        (a, b) => a == b,
    }
}
