//! Single-pass backtester.
//!
//! Replays one strategy over one candle window. Sizing is all-in/all-out:
//! BUY converts all cash into the asset at the candle's close, SELL converts
//! the whole holding back to cash. Equity (`cash + quantity * close`) is
//! recorded after every candle.
//!
//! The ledger strictly alternates BUY/SELL: a BUY while already holding and a
//! SELL while flat are ignored, so wins and losses can be classified pairwise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trendguard_core::domain::Candle;
use trendguard_core::signals::{SignalAction, TrendSignalConfig, TrendSignalGenerator};

use crate::metrics::max_drawdown;

/// Current schema version for serialized backtest results.
pub const SCHEMA_VERSION: u32 = 1;

// ─── Strategy ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

/// A strategy sees the candles up to and including the current one, plus the
/// quantity currently held, and returns what to do at this candle's close.
pub trait BacktestStrategy {
    fn decide(&self, candles: &[Candle], position: f64) -> TradeAction;
}

impl<F> BacktestStrategy for F
where
    F: Fn(&[Candle], f64) -> TradeAction,
{
    fn decide(&self, candles: &[Candle], position: f64) -> TradeAction {
        self(candles, position)
    }
}

/// Spot adaptation of the trend signal generator: LONG buys when flat,
/// CLOSE_LONG or SHORT sells when holding.
#[derive(Debug, Clone, Default)]
pub struct TrendFollowingStrategy {
    generator: TrendSignalGenerator,
}

impl TrendFollowingStrategy {
    pub fn new(config: TrendSignalConfig) -> Self {
        Self {
            generator: TrendSignalGenerator::new(config),
        }
    }
}

impl BacktestStrategy for TrendFollowingStrategy {
    fn decide(&self, candles: &[Candle], position: f64) -> TradeAction {
        let signal = self.generator.generate(candles);
        match signal.action {
            SignalAction::Long if position <= 0.0 => TradeAction::Buy,
            SignalAction::CloseLong | SignalAction::Short if position > 0.0 => TradeAction::Sell,
            _ => TradeAction::Hold,
        }
    }
}

// ─── Settings and results ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_balance: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
        }
    }
}

/// One executed ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Candle index within the backtested window.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub action: TradeAction,
    pub price: f64,
    pub quantity: f64,
    /// price * quantity
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestPeriod {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub candles: usize,
}

/// Complete result of one backtest run. Immutable after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub label: String,
    pub period: BacktestPeriod,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub trades: Vec<TradeRecord>,
    pub wins: usize,
    pub losses: usize,
    /// Largest peak-to-trough drop of the equity curve, as a positive percentage.
    pub max_drawdown_pct: f64,
    pub equity_curve: Vec<f64>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn total_return_pct(&self) -> f64 {
        if self.initial_balance <= 0.0 {
            return 0.0;
        }
        (self.final_balance - self.initial_balance) / self.initial_balance * 100.0
    }

    /// Wins over closed pairs, as a fraction. 0 when nothing closed.
    pub fn win_rate(&self) -> f64 {
        let closed = self.wins + self.losses;
        if closed == 0 {
            return 0.0;
        }
        self.wins as f64 / closed as f64
    }

    /// Number of ledger entries (buys and sells).
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    /// BLAKE3 hex digest of the JSON form. Equal results have equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

// ─── Engine ─────────────────────────────────────────────────────────

/// Run `strategy` over `candles` and return the ledger, equity curve and
/// statistics. Deterministic for identical inputs.
pub fn run_backtest<S>(
    candles: &[Candle],
    strategy: &S,
    symbol: &str,
    label: &str,
    settings: &BacktestSettings,
) -> BacktestResult
where
    S: BacktestStrategy + ?Sized,
{
    let mut cash = settings.initial_balance;
    let mut position = 0.0_f64;
    let mut trades = Vec::new();
    let mut equity_curve = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        let price = candle.close;
        match strategy.decide(&candles[..=i], position) {
            TradeAction::Buy if cash > 0.0 && price > 0.0 => {
                let quantity = cash / price;
                trades.push(TradeRecord {
                    index: i,
                    timestamp: candle.timestamp,
                    action: TradeAction::Buy,
                    price,
                    quantity,
                    value: quantity * price,
                });
                position = quantity;
                cash = 0.0;
            }
            TradeAction::Sell if position > 0.0 => {
                let value = position * price;
                trades.push(TradeRecord {
                    index: i,
                    timestamp: candle.timestamp,
                    action: TradeAction::Sell,
                    price,
                    quantity: position,
                    value,
                });
                cash += value;
                position = 0.0;
            }
            _ => {}
        }
        equity_curve.push(cash + position * price);
    }

    let final_balance = match candles.last() {
        Some(last) => cash + position * last.close,
        None => cash,
    };
    let (wins, losses) = count_pairs(&trades);

    BacktestResult {
        schema_version: SCHEMA_VERSION,
        symbol: symbol.to_string(),
        label: label.to_string(),
        period: BacktestPeriod {
            start: candles.first().map(|c| c.timestamp),
            end: candles.last().map(|c| c.timestamp),
            candles: candles.len(),
        },
        initial_balance: settings.initial_balance,
        final_balance,
        trades,
        wins,
        losses,
        max_drawdown_pct: max_drawdown(&equity_curve).abs() * 100.0,
        equity_curve,
    }
}

/// Classify each BUY/SELL pair by whether the sell value beat the buy value.
/// A trailing unmatched BUY is an open position and counts as neither.
fn count_pairs(trades: &[TradeRecord]) -> (usize, usize) {
    let mut wins = 0;
    let mut losses = 0;
    for pair in trades.chunks_exact(2) {
        if pair[1].value > pair[0].value {
            wins += 1;
        } else {
            losses += 1;
        }
    }
    (wins, losses)
}
