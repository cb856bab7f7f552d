//! Moving Average Convergence Divergence (MACD).
//!
//! MACD = EMA(fast) - EMA(slow); signal = EMA(signal_period) of MACD;
//! histogram = MACD - signal. Defaults 12 / 26 / 9.

use super::ema::{ema, ema_of_series};
use crate::domain::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// The three MACD series, index-aligned with the input candles.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl Macd {
    pub fn compute(&self, candles: &[Candle]) -> MacdSeries {
        macd(candles, self.fast, self.slow, self.signal)
    }
}

pub fn macd(candles: &[Candle], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = ema(candles, fast);
    let slow_ema = ema(candles, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_of_series(&line, signal);
    let histogram = line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();
    MacdSeries {
        macd: line,
        signal: signal_line,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles};

    #[test]
    fn macd_flat_series_is_zero() {
        let candles = make_candles(&[50.0; 60]);
        let series = Macd::default().compute(&candles);
        for i in 0..60 {
            assert_approx(series.macd[i], 0.0, 1e-9);
            assert_approx(series.signal[i], 0.0, 1e-9);
            assert_approx(series.histogram[i], 0.0, 1e-9);
        }
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        let series = Macd::default().compute(&make_candles(&closes));
        assert!(series.macd[79] > 0.0);
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.4).sin() * 5.0).collect();
        let series = macd(&make_candles(&closes), 12, 26, 9);
        for i in 0..40 {
            assert_approx(series.histogram[i], series.macd[i] - series.signal[i], 1e-12);
        }
    }
}
