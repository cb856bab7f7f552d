//! Integration tests for the trend signal generator on constructed series.
//!
//! The crossover series is 60 candles of slow decline followed by a rally
//! that alternates +4 / -2. The rally keeps RSI near 68 (below the
//! overbought veto) while ADX climbs well above threshold, so the golden
//! cross lands as a LONG on the 67th candle. The mirrored series produces
//! the death cross.

use chrono::{Duration, TimeZone, Utc};
use trendguard_core::domain::Candle;
use trendguard_core::signals::{Regime, SignalAction, TrendSignalGenerator};

fn make_candles(closes: &[f64]) -> Vec<Candle> {
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

fn decline_then_rally() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| 200.0 - 0.2 * i as f64).collect();
    let mut p = *closes.last().unwrap();
    for j in 0..80 {
        p += if j % 2 == 0 { 4.0 } else { -2.0 };
        closes.push(p);
    }
    closes
}

fn rally_then_decline() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..60).map(|i| 100.0 + 0.2 * i as f64).collect();
    let mut p = *closes.last().unwrap();
    for j in 0..80 {
        p += if j % 2 == 0 { -4.0 } else { 2.0 };
        closes.push(p);
    }
    closes
}

#[test]
fn golden_cross_after_decline_goes_long() {
    let candles = make_candles(&decline_then_rally());
    let generator = TrendSignalGenerator::default();

    let signal = generator.generate(&candles[..67]);
    assert_eq!(signal.action, SignalAction::Long, "reason: {}", signal.reason);
    assert_eq!(signal.regime, Regime::Trending);
    assert_eq!(signal.confidence, 90.0);

    let price = candles[66].close;
    let sl = signal.stop_loss.unwrap();
    let tp = signal.take_profit.unwrap();
    assert!(sl < price && price < tp);

    let snapshot = signal.indicators.unwrap();
    assert!(snapshot.rsi < 75.0);
    assert!(snapshot.plus_di > snapshot.minus_di);
}

#[test]
fn rally_before_the_cross_asks_shorts_to_close() {
    let candles = make_candles(&decline_then_rally());
    let generator = TrendSignalGenerator::default();

    for n in 61..67 {
        let signal = generator.generate(&candles[..n]);
        assert_eq!(signal.action, SignalAction::CloseShort, "prefix {n}");
    }
}

#[test]
fn death_cross_after_rally_goes_short() {
    let candles = make_candles(&rally_then_decline());
    let generator = TrendSignalGenerator::default();

    let signal = generator.generate(&candles[..67]);
    assert_eq!(signal.action, SignalAction::Short, "reason: {}", signal.reason);

    let price = candles[66].close;
    let sl = signal.stop_loss.unwrap();
    let tp = signal.take_profit.unwrap();
    assert!(tp < price && price < sl);
}

#[test]
fn steady_decline_holds_with_bearish_bias() {
    let candles = make_candles(&decline_then_rally());
    let signal = TrendSignalGenerator::default().generate(&candles[..60]);
    assert_eq!(signal.action, SignalAction::Hold);
}

#[test]
fn flat_series_is_ranging_with_zero_adx() {
    let candles = make_candles(&[100.0; 120]);
    let signal = TrendSignalGenerator::default().generate(&candles);
    assert_eq!(signal.action, SignalAction::Hold);
    assert_eq!(signal.regime, Regime::Ranging);
    assert!(signal.adx_value.abs() < 1e-9);
    assert!(signal.reason.contains("ranging market"));
}

#[test]
fn generator_is_pure() {
    let candles = make_candles(&decline_then_rally());
    let generator = TrendSignalGenerator::default();
    assert_eq!(generator.generate(&candles), generator.generate(&candles));
}
