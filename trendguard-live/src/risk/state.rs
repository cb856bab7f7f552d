//! Mutable risk state and its serializable snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendguard_core::Side;

use crate::history::BoundedHistory;

/// One open one-way position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub leverage: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub opened_at: DateTime<Utc>,
}

impl PositionState {
    /// Quantity times entry price; leverage is not applied.
    pub fn notional(&self) -> f64 {
        self.quantity * self.entry_price
    }

    /// Realized PnL if closed at `exit_price`.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        self.side.direction() * (exit_price - self.entry_price) * self.quantity * self.leverage
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltKind {
    /// Lifted automatically at the next UTC midnight.
    Daily,
    /// Lifted only by a manual kill-switch reset.
    KillSwitch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Halt {
    pub kind: HaltKind,
    pub reason: String,
    pub since: DateTime<Utc>,
    pub resume_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub at: DateTime<Utc>,
    pub equity: f64,
}

/// Realized trade statistics feeding Kelly sizing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub gross_win: f64,
    /// Sum of loss magnitudes (positive).
    pub gross_loss: f64,
}

impl TradeStats {
    /// Breakeven closes count as trades but neither as wins nor losses.
    pub fn record(&mut self, pnl: f64) {
        self.trades += 1;
        if pnl > 0.0 {
            self.wins += 1;
            self.gross_win += pnl;
        } else if pnl < 0.0 {
            self.losses += 1;
            self.gross_loss += -pnl;
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }

    pub fn avg_win(&self) -> f64 {
        if self.wins == 0 {
            0.0
        } else {
            self.gross_win / self.wins as f64
        }
    }

    /// Average loss magnitude (positive).
    pub fn avg_loss(&self) -> f64 {
        if self.losses == 0 {
            0.0
        } else {
            self.gross_loss / self.losses as f64
        }
    }
}

/// Everything the risk manager owns. Mutated only through `RiskManager`.
#[derive(Debug, Clone)]
pub struct RiskState {
    pub starting_equity: f64,
    pub current_equity: f64,
    pub peak_equity: f64,
    pub daily_pnl: f64,
    pub weekly_pnl: f64,
    pub total_pnl: f64,
    pub positions: BTreeMap<String, PositionState>,
    pub halt: Option<Halt>,
    /// Reason the kill switch latched; `None` while disarmed.
    pub kill_switch: Option<String>,
    pub weekly_reduction: bool,
    pub last_daily_reset: DateTime<Utc>,
    pub last_weekly_reset: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub equity_history: BoundedHistory<EquitySample>,
    pub stats: TradeStats,
}

impl RiskState {
    pub fn new(equity: f64, now: DateTime<Utc>, history_capacity: usize) -> Self {
        let mut equity_history = BoundedHistory::new(history_capacity);
        equity_history.push(EquitySample { at: now, equity });
        Self {
            starting_equity: equity,
            current_equity: equity,
            peak_equity: equity,
            daily_pnl: 0.0,
            weekly_pnl: 0.0,
            total_pnl: 0.0,
            positions: BTreeMap::new(),
            halt: None,
            kill_switch: None,
            weekly_reduction: false,
            last_daily_reset: now,
            last_weekly_reset: now,
            last_heartbeat: now,
            equity_history,
            stats: TradeStats::default(),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch.is_some()
    }

    /// Total notional currently open on `symbol`.
    pub fn symbol_notional(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, PositionState::notional)
    }

    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_history.iter().map(|s| s.equity).collect()
    }
}

/// Serializable point-in-time view of the risk state plus derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub at: DateTime<Utc>,
    pub starting_equity: f64,
    pub current_equity: f64,
    pub peak_equity: f64,
    pub daily_pnl: f64,
    pub weekly_pnl: f64,
    pub total_pnl: f64,
    pub positions: Vec<PositionState>,
    pub halt: Option<Halt>,
    pub kill_switch_active: bool,
    pub weekly_reduction: bool,
    /// Fraction, never positive.
    pub current_drawdown: f64,
    /// Worst drawdown replayed over equity history. Fraction, never positive.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub stats: TradeStats,
    pub last_heartbeat: DateTime<Utc>,
}
