use polars::prelude::*;

pub const DATE: &str = "Date";
pub const TICKER: &str = "Ticker";
pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const VOLUME: &str = "Volume";
pub const ADJ_CLOSE: &str = "Adj Close";

/// Output allow-list, in output order.
pub const OUTPUT_COLUMNS: [&str; 8] = [DATE, TICKER, OPEN, HIGH, LOW, CLOSE, VOLUME, ADJ_CLOSE];

/// Date format written to every CSV.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Schema of a shaped long-format frame, before column normalization.
pub struct LongSchema;

impl LongSchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(DATE.into(), DataType::Date),
            Field::new(TICKER.into(), DataType::String),
            Field::new(OPEN.into(), DataType::Float64),
            Field::new(HIGH.into(), DataType::Float64),
            Field::new(LOW.into(), DataType::Float64),
            Field::new(CLOSE.into(), DataType::Float64),
            Field::new(VOLUME.into(), DataType::UInt64),
            Field::new(ADJ_CLOSE.into(), DataType::Float64),
        ])
    }

    /// Check that a frame carries every long-format column with the right type.
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_order_matches_header() {
        assert_eq!(
            OUTPUT_COLUMNS.join(","),
            "Date,Ticker,Open,High,Low,Close,Volume,Adj Close"
        );
    }

    #[test]
    fn long_schema_covers_allow_list() {
        let schema = LongSchema::schema();
        for col in OUTPUT_COLUMNS {
            assert!(schema.contains(col), "missing {col}");
        }
    }

    #[test]
    fn validate_rejects_missing_column() {
        let df = DataFrame::new(vec![
            Column::new(TICKER.into(), &["SPY"]),
            Column::new(OPEN.into(), &[400.0]),
        ])
        .unwrap();

        let result = LongSchema::validate(&df);
        assert!(matches!(result.unwrap_err(), SchemaError::MissingColumn(_)));
    }
}
