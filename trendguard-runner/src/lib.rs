//! TrendGuard Runner: offline evaluation of trading strategies.
//!
//! This crate builds on `trendguard-core` to provide:
//! - A single-pass, deterministic backtester with an all-in/all-out ledger
//! - Walk-forward validation over rolling IS/OOS windows with a verdict
//! - Equity-curve metrics shared with the live risk manager
//! - CSV candle loading and JSON/CSV result export

pub mod backtest;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod walk_forward;

pub use backtest::{
    run_backtest, BacktestResult, BacktestSettings, BacktestStrategy, TradeAction, TradeRecord,
    TrendFollowingStrategy,
};
pub use data_loader::{load_candles_csv, read_candles, write_candles_csv, LoadError};
pub use walk_forward::{
    create_windows, run_walk_forward, Verdict, WalkForwardConfig, WalkForwardError,
    WalkForwardResult, WalkForwardSummary, WalkForwardWindow, WindowSpec,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn trend_strategy_is_send_sync() {
        assert_send::<TrendFollowingStrategy>();
        assert_sync::<TrendFollowingStrategy>();
    }

    #[test]
    fn walk_forward_types_are_send_sync() {
        assert_send::<WalkForwardConfig>();
        assert_sync::<WalkForwardConfig>();
        assert_send::<WalkForwardResult>();
        assert_sync::<WalkForwardResult>();
    }
}
