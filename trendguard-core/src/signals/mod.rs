//! Trend signal generation.
//!
//! A regime-filtered EMA crossover: trend entries fire only on a fresh
//! fast/slow EMA cross confirmed by the directional index, gated on ADX
//! trend strength and vetoed by RSI extremes. Stops and targets are placed
//! at ATR multiples from the current price.

pub mod config;
pub mod regime;
pub mod trend;

pub use config::{SignalConfigError, TrendSignalConfig};
pub use regime::{classify_regime, Regime};
pub use trend::{IndicatorSnapshot, SignalAction, TrendSignal, TrendSignalGenerator};
