//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|); TR[0] = high-low.
//! Wilder smoothing: the first `period` values are the running simple average,
//! thereafter ATR[t] = (ATR[t-1] * (period-1) + TR[t]) / period.

use super::Indicator;
use crate::domain::Candle;

pub const DEFAULT_ATR_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        atr(candles, self.period)
    }
}

pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    wilder_smooth(&true_range(candles), period)
}

/// Compute the True Range series.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(candles.len());
    for (i, c) in candles.iter().enumerate() {
        if i == 0 {
            tr.push(c.high - c.low);
            continue;
        }
        let pc = candles[i - 1].close;
        tr.push((c.high - c.low).max((c.high - pc).abs()).max((c.low - pc).abs()));
    }
    tr
}

/// Wilder smoothing of a series.
///
/// Indices below `period` hold the running mean of everything seen so far;
/// from `period` on, `out[t] = (out[t-1] * (period-1) + v[t]) / period`.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![0.0; n];
    if period == 0 {
        return result;
    }

    let p = period as f64;
    let mut sum = 0.0;
    for i in 0..n {
        if i < period {
            sum += values[i];
            result[i] = sum / (i + 1) as f64;
        } else {
            result[i] = (result[i - 1] * (p - 1.0) + values[i]) / p;
        }
    }
    result
}
