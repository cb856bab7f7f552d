//! Property tests for indicator invariants.
//!
//! Uses proptest to verify:
//! 1. Every indicator returns a series as long as its input
//! 2. RSI stays within [0, 100]
//! 3. ADX and both DI lines stay within [0, 100]
//! 4. ATR is never negative
//! 5. The signal generator never panics and keeps confidence in [0, 100]

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use trendguard_core::domain::Candle;
use trendguard_core::indicators::{adx, atr, ema, macd, rsi, sma};
use trendguard_core::signals::TrendSignalGenerator;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1000.0_f64, 0..max_len)
}

fn to_candles(closes: &[f64]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                timestamp: base + Duration::minutes(15 * i as i64),
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 10.0,
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn outputs_are_index_aligned(closes in arb_closes(200), period in 1usize..30) {
        let candles = to_candles(&closes);
        let n = candles.len();
        prop_assert_eq!(sma(&candles, period).len(), n);
        prop_assert_eq!(ema(&candles, period).len(), n);
        prop_assert_eq!(rsi(&candles, period).len(), n);
        prop_assert_eq!(atr(&candles, period).len(), n);
        let di = adx(&candles, period);
        prop_assert_eq!(di.adx.len(), n);
        prop_assert_eq!(di.plus_di.len(), n);
        prop_assert_eq!(di.minus_di.len(), n);
        let m = macd(&candles, 12, 26, 9);
        prop_assert_eq!(m.histogram.len(), n);
    }

    #[test]
    fn rsi_is_bounded(closes in arb_closes(200), period in 1usize..30) {
        let candles = to_candles(&closes);
        for v in rsi(&candles, period) {
            prop_assert!((0.0..=100.0).contains(&v), "RSI out of range: {}", v);
        }
    }

    #[test]
    fn directional_index_is_bounded(closes in arb_closes(200), period in 1usize..30) {
        let candles = to_candles(&closes);
        let di = adx(&candles, period);
        for i in 0..candles.len() {
            prop_assert!((0.0..=100.0 + 1e-9).contains(&di.adx[i]));
            prop_assert!((0.0..=100.0 + 1e-9).contains(&di.plus_di[i]));
            prop_assert!((0.0..=100.0 + 1e-9).contains(&di.minus_di[i]));
        }
    }

    #[test]
    fn atr_is_non_negative(closes in arb_closes(200), period in 1usize..30) {
        let candles = to_candles(&closes);
        for v in atr(&candles, period) {
            prop_assert!(v >= 0.0);
        }
    }

    #[test]
    fn signal_confidence_is_bounded(closes in arb_closes(150)) {
        let candles = to_candles(&closes);
        let signal = TrendSignalGenerator::default().generate(&candles);
        prop_assert!((0.0..=100.0).contains(&signal.confidence));
        if let (Some(sl), Some(tp)) = (signal.stop_loss, signal.take_profit) {
            prop_assert!(signal.action.is_entry());
            prop_assert!(sl != tp);
        }
    }
}
