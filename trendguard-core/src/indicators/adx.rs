//! ADX — Average Directional Index (Wilder), with +DI and -DI.
//!
//! Steps:
//! 1. +DM / -DM from consecutive candles: up = high[t]-high[t-1], down = low[t-1]-low[t].
//!    Only the larger move counts and only when positive; ties count as zero for both.
//! 2. Wilder-smooth +DM, -DM and TR.
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR); -DI symmetric.
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI).
//! 5. ADX = Wilder-smoothed DX.
//!
//! Fewer than `period` candles: every series is 0.

use super::atr::{true_range, wilder_smooth};
use crate::domain::Candle;

pub const DEFAULT_ADX_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self { period }
    }

    pub fn lookback(&self) -> usize {
        2 * self.period
    }

    pub fn compute(&self, candles: &[Candle]) -> DirectionalIndex {
        adx(candles, self.period)
    }
}

impl Default for Adx {
    fn default() -> Self {
        Self::new(DEFAULT_ADX_PERIOD)
    }
}

/// ADX with its directional components, index-aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalIndex {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

impl DirectionalIndex {
    fn zeros(n: usize) -> Self {
        Self {
            adx: vec![0.0; n],
            plus_di: vec![0.0; n],
            minus_di: vec![0.0; n],
        }
    }
}

pub fn adx(candles: &[Candle], period: usize) -> DirectionalIndex {
    let n = candles.len();
    if period == 0 || n < period {
        return DirectionalIndex::zeros(n);
    }

    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = candles[i].high - candles[i - 1].high;
        let down = candles[i - 1].low - candles[i].low;
        if up > down && up > 0.0 {
            plus_dm[i] = up;
        }
        if down > up && down > 0.0 {
            minus_dm[i] = down;
        }
    }

    let smooth_tr = wilder_smooth(&true_range(candles), period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut plus_di = vec![0.0; n];
    let mut minus_di = vec![0.0; n];
    let mut dx = vec![0.0; n];
    for i in 0..n {
        if smooth_tr[i] <= 0.0 {
            continue;
        }
        plus_di[i] = 100.0 * smooth_plus[i] / smooth_tr[i];
        minus_di[i] = 100.0 * smooth_minus[i] / smooth_tr[i];
        let di_sum = plus_di[i] + minus_di[i];
        if di_sum > 0.0 {
            dx[i] = 100.0 * (plus_di[i] - minus_di[i]).abs() / di_sum;
        }
    }

    DirectionalIndex {
        adx: wilder_smooth(&dx, period),
        plus_di,
        minus_di,
    }
}
