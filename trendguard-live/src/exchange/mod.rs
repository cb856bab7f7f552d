//! Market data and execution collaborator.
//!
//! The scan loop reaches the venue only through the [`Exchange`] trait. Risk
//! state is mutated only after the exchange confirms an order, so a failed
//! call leaves internal and venue state consistent.

pub mod paper;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use trendguard_core::{Candle, CandleError, Side};

use crate::actor::KillSwitchHandler;

pub use paper::PaperExchange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The order side that opens `side`.
    pub fn opening(side: Side) -> Self {
        match side {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// The order side that reduces `side`.
    pub fn closing(side: Side) -> Self {
        Self::opening(side.opposite())
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit { price: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub leverage: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reduce_only: bool,
}

impl OrderRequest {
    pub fn market(symbol: &str, side: OrderSide, quantity: f64, leverage: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            leverage,
            stop_loss: None,
            take_profit: None,
            reduce_only: false,
        }
    }

    pub fn with_protection(mut self, stop_loss: Option<f64>, take_profit: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("no market data for {0} yet")]
    NoData(String),
    #[error("insufficient margin: need {needed:.2}, available {available:.2}")]
    InsufficientMargin { needed: f64, available: f64 },
    #[error("no open position for {0}")]
    NoPosition(String),
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("invalid candle series for {symbol}: {source}")]
    InvalidCandles {
        symbol: String,
        #[source]
        source: CandleError,
    },
    #[error("exchange unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlattenFailure {
    pub symbol: String,
    pub error: String,
}

/// Per-symbol outcome of closing every open position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlattenReport {
    pub closed: Vec<String>,
    pub errors: Vec<FlattenFailure>,
}

impl FlattenReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[async_trait]
pub trait Exchange: Send + Sync {
    /// Called once at the start of every scan. Replay venues advance here.
    async fn on_scan(&self) -> Result<(), ExchangeError> {
        Ok(())
    }

    /// Most recent `limit` candles, oldest first.
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// Realized wallet balance, excluding unrealized PnL of open positions.
    /// The risk manager books PnL itself when a position closes.
    async fn fetch_equity(&self) -> Result<f64, ExchangeError>;

    /// Returns the venue order id.
    async fn place_order(&self, order: &OrderRequest) -> Result<String, ExchangeError>;

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExchangeError>;

    /// Close everything. A failure on one symbol must not stop the others.
    async fn close_all_positions(&self) -> FlattenReport;
}

/// Kill-switch handler that flattens every venue position.
pub struct FlattenOnKillSwitch {
    exchange: Arc<dyn Exchange>,
}

impl FlattenOnKillSwitch {
    pub fn new(exchange: Arc<dyn Exchange>) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl KillSwitchHandler for FlattenOnKillSwitch {
    async fn on_kill_switch(&self, reason: &str) -> anyhow::Result<()> {
        let report = self.exchange.close_all_positions().await;
        info!(
            %reason,
            closed = report.closed.len(),
            failed = report.errors.len(),
            "flattened positions after kill switch"
        );
        for failure in &report.errors {
            warn!(symbol = %failure.symbol, error = %failure.error, "failed to flatten position");
        }
        if !report.is_clean() {
            anyhow::bail!("failed to flatten {} position(s)", report.errors.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_sides_for_positions() {
        assert_eq!(OrderSide::opening(Side::Long), OrderSide::Buy);
        assert_eq!(OrderSide::closing(Side::Long), OrderSide::Sell);
        assert_eq!(OrderSide::opening(Side::Short), OrderSide::Sell);
        assert_eq!(OrderSide::closing(Side::Short), OrderSide::Buy);
    }

    #[test]
    fn builder_sets_flags() {
        let order = OrderRequest::market("BTCUSDT", OrderSide::Sell, 1.5, 3.0)
            .with_protection(Some(110.0), Some(90.0))
            .reduce_only();
        assert!(order.reduce_only);
        assert_eq!(order.stop_loss, Some(110.0));
        assert_eq!(order.order_type, OrderType::Market);
    }
}
