//! Risk manager thresholds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::DEFAULT_HISTORY_CAPACITY;

/// All risk thresholds. Drawdown limits are negative fractions of equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Hard cap on the fraction of equity risked by one trade.
    pub max_risk_per_trade: f64,
    /// Multiplier applied to the raw Kelly percentage.
    pub kelly_fraction: f64,
    pub daily_drawdown_limit: f64,
    pub weekly_drawdown_limit: f64,
    pub total_drawdown_limit: f64,
    /// Risk multiplier while the weekly limit is breached.
    pub weekly_reduction_factor: f64,
    pub max_concurrent_positions: usize,
    /// Per-symbol notional cap as a fraction of current equity.
    pub max_single_asset_pct: f64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    /// Closed trades required before Kelly sizing replaces stop-distance sizing.
    pub min_trades_for_kelly: usize,
    pub equity_history_capacity: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_risk_per_trade: 0.02,
            kelly_fraction: 0.25,
            daily_drawdown_limit: -0.03,
            weekly_drawdown_limit: -0.07,
            total_drawdown_limit: -0.15,
            weekly_reduction_factor: 0.5,
            max_concurrent_positions: 5,
            max_single_asset_pct: 0.25,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 5 * 60 * 1000,
            min_trades_for_kelly: 10,
            equity_history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RiskConfigError {
    #[error("{name} must be in (0, 1], got {value}")]
    Fraction { name: &'static str, value: f64 },
    #[error("{name} must be a negative fraction above -1, got {value}")]
    DrawdownLimit { name: &'static str, value: f64 },
    #[error("max_concurrent_positions must be at least 1")]
    NoPositionsAllowed,
    #[error("heartbeat timeout ({timeout_ms} ms) must exceed the check interval ({interval_ms} ms)")]
    Heartbeat { interval_ms: u64, timeout_ms: u64 },
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        for (name, value) in [
            ("max_risk_per_trade", self.max_risk_per_trade),
            ("kelly_fraction", self.kelly_fraction),
            ("weekly_reduction_factor", self.weekly_reduction_factor),
            ("max_single_asset_pct", self.max_single_asset_pct),
        ] {
            if value.is_nan() || value <= 0.0 || value > 1.0 {
                return Err(RiskConfigError::Fraction { name, value });
            }
        }
        for (name, value) in [
            ("daily_drawdown_limit", self.daily_drawdown_limit),
            ("weekly_drawdown_limit", self.weekly_drawdown_limit),
            ("total_drawdown_limit", self.total_drawdown_limit),
        ] {
            if value.is_nan() || value >= 0.0 || value <= -1.0 {
                return Err(RiskConfigError::DrawdownLimit { name, value });
            }
        }
        if self.max_concurrent_positions == 0 {
            return Err(RiskConfigError::NoPositionsAllowed);
        }
        if self.heartbeat_interval_ms == 0 || self.heartbeat_timeout_ms <= self.heartbeat_interval_ms {
            return Err(RiskConfigError::Heartbeat {
                interval_ms: self.heartbeat_interval_ms,
                timeout_ms: self.heartbeat_timeout_ms,
            });
        }
        Ok(())
    }
}
