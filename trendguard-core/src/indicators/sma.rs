//! Simple Moving Average (SMA).
//!
//! SMA[t] = mean(close[t-period+1..=t]).
//! Values before warm-up (t < period - 1) are reported as 0.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        sma(candles, self.period)
    }
}

/// SMA of closes.
pub fn sma(candles: &[Candle], period: usize) -> Vec<f64> {
    let values: Vec<f64> = candles.iter().map(|c| c.close).collect();
    sma_of_series(&values, period)
}

/// SMA of an arbitrary series, using a rolling sum.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![0.0; n];
    if period == 0 {
        return result;
    }

    let mut sum = 0.0;
    for i in 0..n {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            result[i] = sum / period as f64;
        }
    }
    result
}
