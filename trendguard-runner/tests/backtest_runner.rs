//! Integration tests for the backtester driven by the trend signal generator.

use trendguard_core::data::synthetic_candles;
use trendguard_core::signals::TrendSignalConfig;
use trendguard_runner::backtest::{
    run_backtest, BacktestSettings, TradeAction, TrendFollowingStrategy,
};

#[test]
fn identical_inputs_give_identical_results() {
    let candles = synthetic_candles("BTCUSDT", 600, 11);
    let strategy = TrendFollowingStrategy::default();
    let settings = BacktestSettings::default();

    let a = run_backtest(&candles, &strategy, "BTCUSDT", "determinism", &settings);
    let b = run_backtest(&candles, &strategy, "BTCUSDT", "determinism", &settings);

    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn ledger_alternates_and_matches_equity() {
    let candles = synthetic_candles("ETHUSDT", 800, 5);
    let strategy = TrendFollowingStrategy::new(TrendSignalConfig {
        fast_period: 5,
        slow_period: 20,
        adx_threshold: 15.0,
        ..Default::default()
    });
    let result = run_backtest(&candles, &strategy, "ETHUSDT", "ledger", &BacktestSettings::default());

    for (i, trade) in result.trades.iter().enumerate() {
        let expected = if i % 2 == 0 { TradeAction::Buy } else { TradeAction::Sell };
        assert_eq!(trade.action, expected, "ledger entry {i}");
    }
    assert_eq!(result.wins + result.losses, result.trades.len() / 2);
    assert_eq!(result.equity_curve.len(), candles.len());

    let last = *result.equity_curve.last().unwrap();
    assert!((last - result.final_balance).abs() < 1e-6);
    assert!(result.max_drawdown_pct >= 0.0 && result.max_drawdown_pct <= 100.0);
}

#[test]
fn equity_is_flat_while_in_cash() {
    let candles = synthetic_candles("SOLUSDT", 200, 2);
    let never = |_: &[trendguard_core::domain::Candle], _: f64| TradeAction::Hold;
    let result = run_backtest(&candles, &never, "SOLUSDT", "cash", &BacktestSettings::default());
    assert!(result.equity_curve.iter().all(|&e| e == 10_000.0));
    assert_eq!(result.total_return_pct(), 0.0);
    assert_eq!(result.win_rate(), 0.0);
}
