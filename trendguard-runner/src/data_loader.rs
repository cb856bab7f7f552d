//! Candle loading from CSV files.
//!
//! Expected header: `timestamp,open,high,low,close,volume`. The timestamp
//! column accepts either RFC 3339 text or integer milliseconds since the Unix
//! epoch (the format exchange kline endpoints return). Rows must already be
//! oldest-first; loaded candles go through `validate_candles` so ordering or
//! sanity violations surface here instead of corrupting indicator state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use trendguard_core::domain::{validate_candles, Candle, CandleError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("no candles in '{0}'")]
    Empty(PathBuf),

    #[error("invalid candle data: {0}")]
    Invalid(#[from] CandleError),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load and validate candles from a CSV file.
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let candles = read_candles(file)?;
    if candles.is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }
    debug!(path = %path.display(), candles = candles.len(), "loaded candles");
    Ok(candles)
}

/// Parse and validate candles from any CSV reader.
pub fn read_candles<R: std::io::Read>(reader: R) -> Result<Vec<Candle>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut candles = Vec::new();

    for (row, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: row + 1,
            value: record.timestamp.clone(),
        })?;
        candles.push(Candle {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }

    validate_candles(&candles)?;
    Ok(candles)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(millis) = value.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp_millis(millis);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Write candles in the format `load_candles_csv` reads.
pub fn write_candles_csv<W: std::io::Write>(writer: W, candles: &[Candle]) -> Result<(), LoadError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for c in candles {
        wtr.write_record([
            c.timestamp.to_rfc3339(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}
