//! Exponential Moving Average (EMA).
//!
//! Multiplier k = 2 / (period + 1).
//! Seed: while fewer than `period` samples exist, EMA[t] is the running
//! simple average of everything seen so far (so EMA[period-1] is the SMA).
//! Thereafter: EMA[t] = (close[t] - EMA[t-1]) * k + EMA[t-1].

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        ema(candles, self.period)
    }
}

/// EMA of closes.
pub fn ema(candles: &[Candle], period: usize) -> Vec<f64> {
    let values: Vec<f64> = candles.iter().map(|c| c.close).collect();
    ema_of_series(&values, period)
}

/// EMA of an arbitrary series. Used by MACD for the signal line.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![0.0; n];
    if period == 0 {
        return result;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut sum = 0.0;
    for i in 0..n {
        if i < period {
            sum += values[i];
            result[i] = sum / (i + 1) as f64;
        } else {
            let prev = result[i - 1];
            result[i] = (values[i] - prev) * k + prev;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn ema_period_1_equals_close() {
        let candles = make_candles(&[100.0, 200.0, 300.0]);
        let result = Ema::new(1).compute(&candles);
        assert_approx(result[0], 100.0, DEFAULT_EPSILON);
        assert_approx(result[1], 200.0, DEFAULT_EPSILON);
        assert_approx(result[2], 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_known_values() {
        // Closes: 10, 11, 12, 13, 14; k = 0.5
        // Running average seed: 10, 10.5, 11
        // EMA[3] = (13 - 11) * 0.5 + 11 = 12
        // EMA[4] = (14 - 12) * 0.5 + 12 = 13
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Ema::new(3).compute(&candles);

        assert_approx(result[0], 10.0, DEFAULT_EPSILON);
        assert_approx(result[1], 10.5, DEFAULT_EPSILON);
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[3], 12.0, DEFAULT_EPSILON);
        assert_approx(result[4], 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let result = ema_of_series(&[42.0; 30], 10);
        for v in result {
            assert_approx(v, 42.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn ema_lookback() {
        assert_eq!(Ema::new(20).lookback(), 19);
        assert_eq!(Ema::new(1).lookback(), 0);
    }

    #[test]
    fn ema_of_series_matches_indicator() {
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let values: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let from_indicator = Ema::new(3).compute(&candles);
        let from_series = ema_of_series(&values, 3);
        for i in 0..6 {
            assert_approx(from_indicator[i], from_series[i], DEFAULT_EPSILON);
        }
    }
}
