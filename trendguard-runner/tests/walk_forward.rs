//! Integration tests for walk-forward validation.

use trendguard_core::data::synthetic_candles;
use trendguard_core::domain::Candle;
use trendguard_runner::backtest::{TradeAction, TrendFollowingStrategy};
use trendguard_runner::walk_forward::{run_walk_forward, Verdict, WalkForwardConfig};

use chrono::{Duration, TimeZone, Utc};

fn candles_from(closes: &[f64]) -> Vec<Candle> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: base + Duration::hours(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 100.0,
        })
        .collect()
}

/// Buys on the first candle of every span and holds to the end.
fn buy_and_hold(candles: &[Candle], _position: f64) -> TradeAction {
    if candles.len() == 1 {
        TradeAction::Buy
    } else {
        TradeAction::Hold
    }
}

fn equal_spans(min_trades: usize) -> WalkForwardConfig {
    WalkForwardConfig {
        in_sample_period: 50,
        out_of_sample_period: 50,
        min_trades,
        ..Default::default()
    }
}

#[test]
fn declining_market_fails_on_negative_compounded_return() {
    let closes: Vec<f64> = (0..300).map(|i| 100.0 * 0.999_f64.powi(i)).collect();
    let candles = candles_from(&closes);

    let result = run_walk_forward(&candles, &buy_and_hold, "BTCUSDT", &equal_spans(0)).unwrap();

    assert_eq!(result.summary.window_count, 5);
    assert!(result.summary.overfit_reasons.is_empty());
    assert!(result.summary.compounded_oos_return_pct < 0.0);
    assert_eq!(result.verdict, Verdict::Fail);
    assert!(result.verdict_reason.contains("negative compounded"));
}

#[test]
fn uniformly_positive_windows_trip_the_sharpe_ceiling() {
    // Steady uptrend with a mild wave: every OOS window gains 8-11%, so the
    // per-window Sharpe is far above 3.
    let closes: Vec<f64> = (0..300)
        .map(|i| 100.0 * 1.002_f64.powi(i) * (1.0 + 0.03 * (i as f64 / 7.0).sin()))
        .collect();
    let candles = candles_from(&closes);

    let result = run_walk_forward(&candles, &buy_and_hold, "BTCUSDT", &equal_spans(0)).unwrap();

    assert_eq!(result.summary.window_count, 5);
    assert!(result.summary.oos_sharpe > 3.0);
    assert_eq!(result.verdict, Verdict::Fail);
    assert!(result.verdict_reason.contains("too good to be true"));
}

#[test]
fn too_few_trades_is_a_warning() {
    let closes: Vec<f64> = (0..300).map(|i| 100.0 * 0.999_f64.powi(i)).collect();
    let candles = candles_from(&closes);

    // One BUY per OOS window is 5 trades, short of the default 30.
    let result = run_walk_forward(&candles, &buy_and_hold, "BTCUSDT", &equal_spans(30)).unwrap();
    assert_eq!(result.summary.total_oos_trades, 5);
    assert_eq!(result.verdict, Verdict::Warning);
}

#[test]
fn windows_come_back_in_order_and_reproducibly() {
    let candles = synthetic_candles("BTCUSDT", 1000, 21);
    let config = WalkForwardConfig {
        in_sample_period: 300,
        out_of_sample_period: 150,
        ..Default::default()
    };
    let strategy = TrendFollowingStrategy::default();

    let a = run_walk_forward(&candles, &strategy, "BTCUSDT", &config).unwrap();
    let b = run_walk_forward(&candles, &strategy, "BTCUSDT", &config).unwrap();

    assert_eq!(a.windows.len(), 4);
    for (i, w) in a.windows.iter().enumerate() {
        assert_eq!(w.spec.index, i);
        assert_eq!(w.in_sample.period.candles, 300);
        assert_eq!(w.out_of_sample.period.candles, 150);
        assert_eq!(w.out_of_sample.period.start, Some(candles[w.spec.oos_start].timestamp));
    }
    assert_eq!(a, b);
}

#[test]
fn insufficient_data_fails_with_reason() {
    let candles = synthetic_candles("BTCUSDT", 120, 1);
    let result = run_walk_forward(
        &candles,
        &buy_and_hold,
        "BTCUSDT",
        &WalkForwardConfig {
            in_sample_period: 100,
            out_of_sample_period: 50,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(result.verdict, Verdict::Fail);
    assert!(result.windows.is_empty());
    assert!(result.verdict_reason.contains("insufficient data"));
}
