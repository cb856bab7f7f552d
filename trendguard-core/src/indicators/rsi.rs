//! Relative Strength Index (RSI).
//!
//! Average gain and average loss over the trailing `period` close-to-close changes.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Warm-up (fewer than `period` changes): 50, neutral.
//! Edge case: avg_loss == 0 → RSI = 100.

use super::Indicator;
use crate::domain::Candle;

pub const DEFAULT_RSI_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(DEFAULT_RSI_PERIOD)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        rsi(candles, self.period)
    }
}

pub fn rsi(candles: &[Candle], period: usize) -> Vec<f64> {
    let n = candles.len();
    let mut result = vec![50.0; n];
    if period == 0 || n <= period {
        return result;
    }

    // gains[i] / losses[i] describe the change from candle i-1 to candle i.
    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let change = candles[i].close - candles[i - 1].close;
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = -change;
        }
    }

    let mut gain_sum: f64 = gains[1..=period].iter().sum();
    let mut loss_sum: f64 = losses[1..=period].iter().sum();
    result[period] = compute_rsi(gain_sum / period as f64, loss_sum / period as f64);

    for i in (period + 1)..n {
        gain_sum += gains[i] - gains[i - period];
        loss_sum += losses[i] - losses[i - period];
        result[i] = compute_rsi(gain_sum / period as f64, loss_sum / period as f64);
    }

    result
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    // Rolling sums can drift a hair below zero.
    if avg_loss <= 1e-12 {
        return 100.0;
    }
    let rs = avg_gain.max(0.0) / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
