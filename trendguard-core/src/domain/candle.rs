//! Candle — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle for a single symbol and interval.
///
/// Sequences are oldest-first. Every recursive indicator (EMA, ATR, ADX)
/// assumes strictly increasing timestamps; use [`validate_candles`] at the
/// boundary where candles enter the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high is the top of the bar, low the bottom, prices positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low > 0.0
            && self.volume >= 0.0
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CandleError {
    #[error("candle {index} is out of order: {timestamp} is not after {previous}")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
    #[error("candle {index} at {timestamp} failed OHLC sanity check")]
    Insane {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Check that a candle sequence is strictly increasing in time and every candle is sane.
pub fn validate_candles(candles: &[Candle]) -> Result<(), CandleError> {
    for (index, candle) in candles.iter().enumerate() {
        if !candle.is_sane() {
            return Err(CandleError::Insane {
                index,
                timestamp: candle.timestamp,
            });
        }
        if index > 0 {
            let previous = candles[index - 1].timestamp;
            if candle.timestamp <= previous {
                return Err(CandleError::OutOfOrder {
                    index,
                    timestamp: candle.timestamp,
                    previous,
                });
            }
        }
    }
    Ok(())
}

/// Extract the close series.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
