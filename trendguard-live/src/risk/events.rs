//! Structured events emitted by the risk core and the scan loop.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendguard_core::Side;

use super::state::RiskSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawdownScope {
    Daily,
    Weekly,
    Total,
}

impl fmt::Display for DrawdownScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawdownScope::Daily => write!(f, "daily"),
            DrawdownScope::Weekly => write!(f, "weekly"),
            DrawdownScope::Total => write!(f, "total"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RiskEvent {
    TradeOpened {
        symbol: String,
        side: Side,
        quantity: f64,
        price: f64,
        leverage: f64,
        at: DateTime<Utc>,
    },
    TradeClosed {
        symbol: String,
        side: Side,
        quantity: f64,
        entry_price: f64,
        exit_price: f64,
        pnl: f64,
        at: DateTime<Utc>,
    },
    DrawdownBreach {
        scope: DrawdownScope,
        /// Observed drawdown fraction.
        value: f64,
        limit: f64,
        at: DateTime<Utc>,
    },
    HeartbeatTimeout {
        silent_ms: i64,
        at: DateTime<Utc>,
    },
    KillSwitchActivated {
        reason: String,
        at: DateTime<Utc>,
    },
    Summary {
        tick: u64,
        snapshot: Box<RiskSnapshot>,
    },
}

impl RiskEvent {
    /// Short machine-friendly name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RiskEvent::TradeOpened { .. } => "trade_opened",
            RiskEvent::TradeClosed { .. } => "trade_closed",
            RiskEvent::DrawdownBreach { .. } => "drawdown_breach",
            RiskEvent::HeartbeatTimeout { .. } => "heartbeat_timeout",
            RiskEvent::KillSwitchActivated { .. } => "kill_switch_activated",
            RiskEvent::Summary { .. } => "summary",
        }
    }
}
