//! Trend signal generator configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Thresholds for the trend signal generator. Every field has a default and
/// may be overridden from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSignalConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    /// Minimum ADX for any trend entry.
    pub adx_threshold: f64,
    /// Stop-loss distance in ATRs.
    pub atr_multiplier_sl: f64,
    /// Take-profit distance in ATRs.
    pub atr_multiplier_tp: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Leverage the live loop applies to entries from this generator.
    pub leverage: f64,
}

impl Default for TrendSignalConfig {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 50,
            adx_threshold: 25.0,
            atr_multiplier_sl: 2.0,
            atr_multiplier_tp: 3.0,
            rsi_overbought: 75.0,
            rsi_oversold: 25.0,
            leverage: 3.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SignalConfigError {
    #[error("fast_period ({fast}) must be >= 1 and below slow_period ({slow})")]
    Periods { fast: usize, slow: usize },
    #[error("ATR multipliers must be positive (sl={sl}, tp={tp})")]
    AtrMultipliers { sl: f64, tp: f64 },
    #[error("RSI bounds must satisfy 0 <= oversold ({oversold}) < overbought ({overbought}) <= 100")]
    RsiBounds { oversold: f64, overbought: f64 },
    #[error("leverage must be >= 1, got {0}")]
    Leverage(f64),
}

impl TrendSignalConfig {
    /// Minimum candle count before any non-HOLD decision: max(slow + 5, 30).
    pub fn min_candles(&self) -> usize {
        (self.slow_period + 5).max(30)
    }

    pub fn validate(&self) -> Result<(), SignalConfigError> {
        if self.fast_period == 0 || self.fast_period >= self.slow_period {
            return Err(SignalConfigError::Periods {
                fast: self.fast_period,
                slow: self.slow_period,
            });
        }
        if self.atr_multiplier_sl <= 0.0 || self.atr_multiplier_tp <= 0.0 {
            return Err(SignalConfigError::AtrMultipliers {
                sl: self.atr_multiplier_sl,
                tp: self.atr_multiplier_tp,
            });
        }
        if !(0.0..=100.0).contains(&self.rsi_oversold)
            || !(0.0..=100.0).contains(&self.rsi_overbought)
            || self.rsi_oversold >= self.rsi_overbought
        {
            return Err(SignalConfigError::RsiBounds {
                oversold: self.rsi_oversold,
                overbought: self.rsi_overbought,
            });
        }
        if self.leverage < 1.0 {
            return Err(SignalConfigError::Leverage(self.leverage));
        }
        Ok(())
    }
}
