//! TrendGuard Core: candles, indicators and the trend signal generator.
//!
//! Everything in this crate is pure and synchronous:
//! - Domain types (candles, sides) and candle validation
//! - Indicator library (SMA, EMA, RSI, MACD, ATR, ADX/DI)
//! - Regime classification and the regime-filtered trend signal generator
//! - Deterministic synthetic candles for tests, benchmarks and dry runs

pub mod data;
pub mod domain;
pub mod indicators;
pub mod signals;

pub use domain::{validate_candles, Candle, CandleError, Side};
pub use signals::{SignalAction, TrendSignal, TrendSignalConfig, TrendSignalGenerator};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed across tasks and rayon workers are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Side>();
        require_sync::<domain::Side>();

        require_send::<signals::TrendSignal>();
        require_sync::<signals::TrendSignal>();
        require_send::<signals::IndicatorSnapshot>();
        require_sync::<signals::IndicatorSnapshot>();
        require_send::<signals::TrendSignalGenerator>();
        require_sync::<signals::TrendSignalGenerator>();
        require_send::<signals::TrendSignalConfig>();
        require_sync::<signals::TrendSignalConfig>();

        require_send::<indicators::DirectionalIndex>();
        require_sync::<indicators::DirectionalIndex>();
        require_send::<indicators::MacdSeries>();
        require_sync::<indicators::MacdSeries>();
    }

    /// Architecture contract: the signal generator sees candles only.
    ///
    /// `generate` takes `&[Candle]` and nothing else, so a signal can never
    /// depend on open positions or account equity.
    #[test]
    fn signal_generator_sees_only_candles() {
        fn _check(generator: &TrendSignalGenerator, candles: &[Candle]) -> TrendSignal {
            generator.generate(candles)
        }
    }
}
