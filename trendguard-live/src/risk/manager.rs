//! The risk manager state machine.
//!
//! [`RiskManager`] is synchronous and single-owner: it never spawns, locks or
//! awaits. The risk actor wraps it so the scan loop and heartbeat monitor are
//! serialized against the same state. Side effects that reach outside the
//! process (notifications, the kill-switch handler) are queued as
//! [`RiskEvent`]s and drained by the owner.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use trendguard_core::Side;
use trendguard_runner::metrics;

use super::config::{RiskConfig, RiskConfigError};
use super::events::{DrawdownScope, RiskEvent};
use super::sizing::{kelly_size, simple_size, Sizing, SizingMethod};
use super::state::{EquitySample, Halt, HaltKind, PositionState, RiskSnapshot, RiskState};
use crate::clock::Clock;

/// Equity-history Sharpe is annualized as if samples were daily.
const SHARPE_PERIODS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("invalid risk config: {0}")]
    Config(#[from] RiskConfigError),
    #[error("starting equity must be positive, got {0}")]
    InvalidEquity(f64),
    #[error("a position is already open for {0}")]
    PositionExists(String),
    #[error("no open position for {0}")]
    UnknownSymbol(String),
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(f64),
    #[error("price must be positive, got {0}")]
    InvalidPrice(f64),
}

/// Why a trade was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    KillSwitch { reason: String },
    Halted {
        reason: String,
        resume_at: Option<DateTime<Utc>>,
    },
    MaxPositions { open: usize, max: usize },
    Concentration { existing: f64, cap: f64 },
    TotalDrawdown { drawdown: f64, limit: f64 },
    InvalidOrder { reason: String },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::KillSwitch { reason } => write!(f, "kill switch active: {reason}"),
            RejectReason::Halted { reason, resume_at } => match resume_at {
                Some(at) => write!(f, "trading halted until {at}: {reason}"),
                None => write!(f, "trading halted: {reason}"),
            },
            RejectReason::MaxPositions { open, max } => {
                write!(f, "max concurrent positions reached ({open}/{max})")
            }
            RejectReason::Concentration { existing, cap } => write!(
                f,
                "single-asset cap exhausted (existing notional {existing:.2} of {cap:.2})"
            ),
            RejectReason::TotalDrawdown { drawdown, limit } => write!(
                f,
                "total drawdown {:.2}% at or beyond limit {:.2}%",
                drawdown * 100.0,
                limit * 100.0
            ),
            RejectReason::InvalidOrder { reason } => write!(f, "invalid order: {reason}"),
        }
    }
}

/// Outcome of the pre-trade gate. Rejections are values, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TradeCheck {
    Allowed { quantity: f64 },
    /// Allowed with the quantity cut to fit the single-asset cap.
    Reduced {
        quantity: f64,
        requested: f64,
        reason: String,
    },
    Rejected { reason: RejectReason },
}

impl TradeCheck {
    /// Quantity to trade, if any.
    pub fn quantity(&self) -> Option<f64> {
        match self {
            TradeCheck::Allowed { quantity } | TradeCheck::Reduced { quantity, .. } => {
                Some(*quantity)
            }
            TradeCheck::Rejected { .. } => None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.quantity().is_some()
    }
}

/// A confirmed entry to record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub leverage: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
    clock: Arc<dyn Clock>,
    events: Vec<RiskEvent>,
}

impl std::fmt::Debug for RiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("pending_events", &self.events.len())
            .finish()
    }
}

impl RiskManager {
    pub fn new(
        config: RiskConfig,
        starting_equity: f64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RiskError> {
        config.validate()?;
        if starting_equity.is_nan() || starting_equity <= 0.0 {
            return Err(RiskError::InvalidEquity(starting_equity));
        }
        let state = RiskState::new(starting_equity, clock.now(), config.equity_history_capacity);
        Ok(Self {
            config,
            state,
            clock,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn position(&self, symbol: &str) -> Option<&PositionState> {
        self.state.positions.get(symbol)
    }

    /// Take all queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<RiskEvent> {
        std::mem::take(&mut self.events)
    }

    // ─── Sizing ─────────────────────────────────────────────────────

    fn risk_multiplier(&self) -> f64 {
        if self.state.weekly_reduction {
            self.config.weekly_reduction_factor
        } else {
            1.0
        }
    }

    /// Fractional Kelly size from explicit win/loss statistics.
    pub fn kelly_position_size(
        &self,
        win_rate: f64,
        avg_win: f64,
        avg_loss: f64,
        price: f64,
        leverage: f64,
    ) -> Sizing {
        kelly_size(
            self.state.current_equity,
            win_rate,
            avg_win,
            avg_loss,
            self.config.kelly_fraction,
            self.config.max_risk_per_trade,
            self.risk_multiplier(),
            price,
            leverage,
        )
    }

    /// Stop-distance size for when no trade statistics are available.
    pub fn simple_position_size(&self, price: f64, stop_price: f64, leverage: f64) -> Sizing {
        simple_size(
            self.state.current_equity,
            self.config.max_risk_per_trade,
            self.risk_multiplier(),
            price,
            stop_price,
            leverage,
        )
    }

    /// Size a new entry: Kelly from realized statistics once enough trades
    /// have closed, stop-distance sizing before that. Without a stop and
    /// without statistics the size is zero.
    pub fn size_entry(&self, price: f64, stop_loss: Option<f64>, leverage: f64) -> Sizing {
        let stats = &self.state.stats;
        if stats.trades >= self.config.min_trades_for_kelly {
            return self.kelly_position_size(
                stats.win_rate(),
                stats.avg_win(),
                stats.avg_loss(),
                price,
                leverage,
            );
        }
        match stop_loss {
            Some(stop) => self.simple_position_size(price, stop, leverage),
            None => Sizing::zero(SizingMethod::Simple),
        }
    }

    // ─── Pre-trade gate ─────────────────────────────────────────────

    /// Ordered gate; the first failing check decides.
    pub fn check_trade(
        &mut self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
        leverage: f64,
    ) -> TradeCheck {
        if let Some(reason) = &self.state.kill_switch {
            return reject(RejectReason::KillSwitch {
                reason: reason.clone(),
            });
        }
        if let Some(halt) = &self.state.halt {
            return reject(RejectReason::Halted {
                reason: halt.reason.clone(),
                resume_at: halt.resume_at,
            });
        }
        if quantity.is_nan() || quantity <= 0.0 || price.is_nan() || price <= 0.0 {
            return reject(RejectReason::InvalidOrder {
                reason: format!("quantity {quantity} at price {price}"),
            });
        }

        let open = self.state.positions.len();
        let has_position = self.state.positions.contains_key(symbol);
        if open >= self.config.max_concurrent_positions && !has_position {
            return reject(RejectReason::MaxPositions {
                open,
                max: self.config.max_concurrent_positions,
            });
        }

        let mut approved = quantity;
        let mut reduced_reason = None;
        let cap = self.config.max_single_asset_pct * self.state.current_equity;
        let existing = self.state.symbol_notional(symbol);
        if existing + quantity * price > cap {
            let remaining = cap - existing;
            if remaining <= 0.0 {
                return reject(RejectReason::Concentration { existing, cap });
            }
            approved = remaining / price;
            reduced_reason = Some(format!(
                "{symbol} notional capped at {cap:.2} (existing {existing:.2})"
            ));
        }

        let dd = self.current_drawdown();
        if dd <= self.config.total_drawdown_limit {
            let limit = self.config.total_drawdown_limit;
            self.events.push(RiskEvent::DrawdownBreach {
                scope: DrawdownScope::Total,
                value: dd,
                limit,
                at: self.clock.now(),
            });
            self.trigger_kill_switch(&format!(
                "total drawdown {:.2}% breached limit {:.2}%",
                dd * 100.0,
                limit * 100.0
            ));
            return reject(RejectReason::TotalDrawdown { drawdown: dd, limit });
        }

        match reduced_reason {
            Some(reason) => {
                info!(
                    symbol,
                    side = %side,
                    leverage,
                    requested = quantity,
                    approved,
                    "trade reduced by concentration cap"
                );
                TradeCheck::Reduced {
                    quantity: approved,
                    requested: quantity,
                    reason,
                }
            }
            None => TradeCheck::Allowed { quantity },
        }
    }

    // ─── Position lifecycle ─────────────────────────────────────────

    pub fn open_position(&mut self, request: OpenRequest) -> Result<(), RiskError> {
        if request.quantity.is_nan() || request.quantity <= 0.0 {
            return Err(RiskError::InvalidQuantity(request.quantity));
        }
        if request.entry_price.is_nan() || request.entry_price <= 0.0 {
            return Err(RiskError::InvalidPrice(request.entry_price));
        }
        if self.state.positions.contains_key(&request.symbol) {
            return Err(RiskError::PositionExists(request.symbol));
        }

        let now = self.clock.now();
        info!(
            symbol = %request.symbol,
            side = %request.side,
            quantity = request.quantity,
            price = request.entry_price,
            leverage = request.leverage,
            "position opened"
        );
        self.events.push(RiskEvent::TradeOpened {
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            price: request.entry_price,
            leverage: request.leverage,
            at: now,
        });
        self.state.positions.insert(
            request.symbol.clone(),
            PositionState {
                symbol: request.symbol,
                side: request.side,
                quantity: request.quantity,
                entry_price: request.entry_price,
                leverage: request.leverage,
                stop_loss: request.stop_loss,
                take_profit: request.take_profit,
                opened_at: now,
            },
        );
        Ok(())
    }

    /// Close the position on `symbol` at `exit_price`, returning realized PnL.
    pub fn close_position(&mut self, symbol: &str, exit_price: f64) -> Result<f64, RiskError> {
        if exit_price.is_nan() || exit_price <= 0.0 {
            return Err(RiskError::InvalidPrice(exit_price));
        }
        let position = self
            .state
            .positions
            .remove(symbol)
            .ok_or_else(|| RiskError::UnknownSymbol(symbol.to_string()))?;

        let now = self.clock.now();
        let pnl = position.pnl_at(exit_price);
        let state = &mut self.state;
        state.current_equity += pnl;
        state.daily_pnl += pnl;
        state.weekly_pnl += pnl;
        state.total_pnl += pnl;
        if state.current_equity > state.peak_equity {
            state.peak_equity = state.current_equity;
        }
        state.equity_history.push(EquitySample {
            at: now,
            equity: state.current_equity,
        });
        state.stats.record(pnl);

        info!(
            symbol,
            side = %position.side,
            entry = position.entry_price,
            exit = exit_price,
            pnl,
            equity = state.current_equity,
            "position closed"
        );
        self.events.push(RiskEvent::TradeClosed {
            symbol: symbol.to_string(),
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            pnl,
            at: now,
        });

        self.check_drawdown_limits();
        Ok(pnl)
    }

    /// Refresh equity from an external balance.
    pub fn update_equity(&mut self, equity: f64) {
        if equity.is_nan() {
            warn!("ignoring NaN equity update");
            return;
        }
        let now = self.clock.now();
        let state = &mut self.state;
        state.current_equity = equity;
        if equity > state.peak_equity {
            state.peak_equity = equity;
        }
        state.equity_history.push(EquitySample { at: now, equity });
        self.check_drawdown_limits();
    }

    // ─── Drawdown limits ────────────────────────────────────────────

    /// Apply due resets, then check daily, weekly and total limits.
    pub fn check_drawdown_limits(&mut self) {
        let now = self.clock.now();
        self.apply_resets(now);

        let equity = self.state.current_equity;
        if equity > 0.0 {
            let daily = self.state.daily_pnl / equity;
            if daily <= self.config.daily_drawdown_limit && !self.state.is_halted() {
                let limit = self.config.daily_drawdown_limit;
                let resume_at = next_utc_midnight(now);
                let reason = format!(
                    "daily drawdown {:.2}% breached limit {:.2}%",
                    daily * 100.0,
                    limit * 100.0
                );
                warn!(%resume_at, daily_pnl = self.state.daily_pnl, "{reason}");
                self.state.halt = Some(Halt {
                    kind: HaltKind::Daily,
                    reason,
                    since: now,
                    resume_at: Some(resume_at),
                });
                self.events.push(RiskEvent::DrawdownBreach {
                    scope: DrawdownScope::Daily,
                    value: daily,
                    limit,
                    at: now,
                });
            }

            let weekly = self.state.weekly_pnl / equity;
            if weekly <= self.config.weekly_drawdown_limit && !self.state.weekly_reduction {
                let limit = self.config.weekly_drawdown_limit;
                warn!(
                    weekly_pnl = self.state.weekly_pnl,
                    factor = self.config.weekly_reduction_factor,
                    "weekly drawdown {:.2}% breached limit {:.2}%; reducing size",
                    weekly * 100.0,
                    limit * 100.0
                );
                self.state.weekly_reduction = true;
                self.events.push(RiskEvent::DrawdownBreach {
                    scope: DrawdownScope::Weekly,
                    value: weekly,
                    limit,
                    at: now,
                });
            }
        }

        let total = self.current_drawdown();
        if total <= self.config.total_drawdown_limit && !self.state.is_kill_switch_active() {
            let limit = self.config.total_drawdown_limit;
            self.events.push(RiskEvent::DrawdownBreach {
                scope: DrawdownScope::Total,
                value: total,
                limit,
                at: now,
            });
            self.trigger_kill_switch(&format!(
                "total drawdown {:.2}% breached limit {:.2}%",
                total * 100.0,
                limit * 100.0
            ));
        }
    }

    fn apply_resets(&mut self, now: DateTime<Utc>) {
        let state = &mut self.state;
        if utc_day_start(now) > utc_day_start(state.last_daily_reset) {
            state.daily_pnl = 0.0;
            state.last_daily_reset = now;
            if state.kill_switch.is_none()
                && matches!(&state.halt, Some(h) if h.kind == HaltKind::Daily)
            {
                state.halt = None;
                info!("daily reset: halt lifted");
            }
        }
        if utc_week_start(now) > utc_week_start(state.last_weekly_reset) {
            state.weekly_pnl = 0.0;
            state.last_weekly_reset = now;
        }
    }

    /// Lift the weekly size reduction. Never happens automatically.
    pub fn clear_weekly_reduction(&mut self) {
        if self.state.weekly_reduction {
            info!("weekly size reduction cleared");
        }
        self.state.weekly_reduction = false;
    }

    // ─── Kill switch ────────────────────────────────────────────────

    /// Latch the kill switch. Returns `true` only when this call latched it.
    ///
    /// The halt is recorded before the activation event is queued, so the
    /// flattening handler always runs against an already-halted state.
    pub fn trigger_kill_switch(&mut self, reason: &str) -> bool {
        if self.state.is_kill_switch_active() {
            return false;
        }
        let now = self.clock.now();
        error!(reason, equity = self.state.current_equity, "KILL SWITCH ACTIVATED");
        self.state.kill_switch = Some(reason.to_string());
        self.state.halt = Some(Halt {
            kind: HaltKind::KillSwitch,
            reason: format!("KILL SWITCH: {reason}"),
            since: now,
            resume_at: None,
        });
        self.events.push(RiskEvent::KillSwitchActivated {
            reason: reason.to_string(),
            at: now,
        });
        true
    }

    /// Manual reset. Optionally reseeds current and peak equity.
    pub fn reset_kill_switch(&mut self, reseed_equity: Option<f64>) {
        let now = self.clock.now();
        warn!(reseed = ?reseed_equity, "kill switch manually reset");
        self.state.kill_switch = None;
        self.state.halt = None;
        self.state.last_heartbeat = now;
        if let Some(equity) = reseed_equity {
            self.state.current_equity = equity;
            self.state.peak_equity = equity;
            self.state.equity_history.push(EquitySample { at: now, equity });
        }
    }

    // ─── Heartbeat ──────────────────────────────────────────────────

    pub fn heartbeat(&mut self) {
        self.state.last_heartbeat = self.clock.now();
    }

    /// Dead-man's switch. Returns `true` when this check fired the kill switch.
    pub fn check_heartbeat(&mut self) -> bool {
        if self.state.is_kill_switch_active() {
            return false;
        }
        let now = self.clock.now();
        let silent = now - self.state.last_heartbeat;
        let timeout = Duration::milliseconds(self.config.heartbeat_timeout_ms as i64);
        if silent <= timeout {
            return false;
        }
        let silent_ms = silent.num_milliseconds();
        self.events.push(RiskEvent::HeartbeatTimeout { silent_ms, at: now });
        self.trigger_kill_switch(&format!("no heartbeat for {}s", silent.num_seconds()))
    }

    // ─── Derived metrics ────────────────────────────────────────────

    /// Drawdown of current equity from peak. Fraction, never positive.
    pub fn current_drawdown(&self) -> f64 {
        metrics::drawdown(self.state.current_equity, self.state.peak_equity)
    }

    /// Worst drawdown replayed over the equity history.
    pub fn max_drawdown(&self) -> f64 {
        metrics::max_drawdown(&self.state.equity_values())
    }

    pub fn sharpe_ratio(&self) -> f64 {
        metrics::sharpe_ratio(&self.state.equity_values(), SHARPE_PERIODS_PER_YEAR)
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        let state = &self.state;
        RiskSnapshot {
            at: self.clock.now(),
            starting_equity: state.starting_equity,
            current_equity: state.current_equity,
            peak_equity: state.peak_equity,
            daily_pnl: state.daily_pnl,
            weekly_pnl: state.weekly_pnl,
            total_pnl: state.total_pnl,
            positions: state.positions.values().cloned().collect(),
            halt: state.halt.clone(),
            kill_switch_active: state.is_kill_switch_active(),
            weekly_reduction: state.weekly_reduction,
            current_drawdown: self.current_drawdown(),
            max_drawdown: self.max_drawdown(),
            sharpe_ratio: self.sharpe_ratio(),
            stats: state.stats.clone(),
            last_heartbeat: state.last_heartbeat,
        }
    }
}

fn reject(reason: RejectReason) -> TradeCheck {
    warn!(%reason, "trade rejected");
    TradeCheck::Rejected { reason }
}

fn utc_day_start(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Monday 00:00 UTC of the week containing `t`.
fn utc_week_start(t: DateTime<Utc>) -> DateTime<Utc> {
    utc_day_start(t) - Duration::days(t.weekday().num_days_from_monday() as i64)
}

fn next_utc_midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    utc_day_start(t) + Duration::days(1)
}
