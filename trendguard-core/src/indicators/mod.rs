//! Indicator library.
//!
//! Every indicator is a pure function of an oldest-first candle slice and
//! returns a series index-aligned with its input (same length). Warm-up
//! values are neutral numbers rather than NaN: 0 for averages and ranges,
//! 50 for RSI. Multi-series indicators (MACD, ADX) return a bundle struct so
//! all series come from one pass.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use adx::{adx, Adx, DirectionalIndex};
pub use atr::{atr, true_range, wilder_smooth, Atr};
pub use ema::{ema, ema_of_series, Ema};
pub use macd::{macd, Macd, MacdSeries};
pub use rsi::{rsi, Rsi};
pub use sma::{sma, Sma};

use crate::domain::Candle;

/// Trait for single-series indicators.
///
/// # Look-ahead contamination guard
/// No value at index t may depend on a candle after t. Every indicator must
/// give identical values for the overlapping prefix of a truncated series.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_10", "atr_14").
    fn name(&self) -> &str;

    /// Number of candles consumed before the value is fully formed.
    fn lookback(&self) -> usize;

    /// Compute the indicator over the whole slice. Output length equals `candles.len()`.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Create synthetic candles from close prices for testing.
///
/// open = previous close (or close for the first candle),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Build candles from explicit (open, high, low, close) tuples.
#[cfg(test)]
pub fn make_ohlc_candles(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Candle {
            timestamp: base + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
