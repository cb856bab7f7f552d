//! In-memory replay exchange.
//!
//! Each symbol is backed by a preloaded candle series. A shared cursor marks
//! the "current" candle and advances one step per scan. Market orders fill at
//! the current close with no fees or slippage. Positions are one-way per
//! symbol; margin is `quantity · price / leverage`. `fetch_equity` reports
//! the realized wallet balance (cash); [`PaperExchange::equity`] adds the
//! unrealized PnL of open positions.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};
use trendguard_core::{validate_candles, Candle, Side};

use super::{
    Exchange, ExchangeError, FlattenFailure, FlattenReport, OrderRequest, OrderSide, OrderType,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PaperPosition {
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub leverage: f64,
}

impl PaperPosition {
    fn margin(&self) -> f64 {
        self.quantity * self.entry_price / self.leverage
    }

    fn unrealized(&self, price: f64) -> f64 {
        self.side.direction() * (price - self.entry_price) * self.quantity * self.leverage
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaperFill {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub reduce_only: bool,
}

#[derive(Debug)]
struct Book {
    series: BTreeMap<String, Vec<Candle>>,
    cursor: usize,
    scanned: bool,
    cash: f64,
    positions: BTreeMap<String, PaperPosition>,
    fills: Vec<PaperFill>,
    failing: HashSet<String>,
    next_order_id: u64,
}

impl Book {
    fn current(&self, symbol: &str) -> Result<&Candle, ExchangeError> {
        let series = self
            .series
            .get(symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?;
        series
            .get(self.cursor.min(series.len().saturating_sub(1)))
            .ok_or_else(|| ExchangeError::NoData(symbol.to_string()))
    }

    fn price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        self.current(symbol).map(|c| c.close)
    }

    fn used_margin(&self) -> f64 {
        self.positions.values().map(PaperPosition::margin).sum()
    }

    fn marked_equity(&self) -> f64 {
        let unrealized: f64 = self
            .positions
            .iter()
            .filter_map(|(symbol, p)| self.price(symbol).ok().map(|px| p.unrealized(px)))
            .sum();
        self.cash + unrealized
    }

    fn order_id(&mut self) -> String {
        self.next_order_id += 1;
        format!("paper-{}", self.next_order_id)
    }

    /// Close `quantity` of the position on `symbol` at the current price.
    fn reduce(&mut self, symbol: &str, quantity: f64) -> Result<f64, ExchangeError> {
        let price = self.price(symbol)?;
        let position = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| ExchangeError::NoPosition(symbol.to_string()))?;
        let closed = quantity.min(position.quantity);
        let realized =
            position.side.direction() * (price - position.entry_price) * closed * position.leverage;
        position.quantity -= closed;
        if position.quantity <= f64::EPSILON {
            self.positions.remove(symbol);
        }
        self.cash += realized;
        Ok(closed)
    }
}

pub struct PaperExchange {
    book: Mutex<Book>,
}

impl PaperExchange {
    /// An empty book. `start_index` is the first "current" candle, so the
    /// first scan sees `start_index + 1` candles. Every later scan advances
    /// the cursor by one.
    pub fn new(starting_cash: f64, start_index: usize) -> Self {
        Self {
            book: Mutex::new(Book {
                series: BTreeMap::new(),
                cursor: start_index,
                scanned: false,
                cash: starting_cash,
                positions: BTreeMap::new(),
                fills: Vec::new(),
                failing: HashSet::new(),
                next_order_id: 0,
            }),
        }
    }

    /// Add a validated candle series for `symbol`.
    pub fn with_series(self, symbol: &str, candles: Vec<Candle>) -> Result<Self, ExchangeError> {
        validate_candles(&candles).map_err(|source| ExchangeError::InvalidCandles {
            symbol: symbol.to_string(),
            source,
        })?;
        self.lock().series.insert(symbol.to_string(), candles);
        Ok(self)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Step the replay cursor. Returns `false` once every series is exhausted.
    pub fn advance(&self) -> bool {
        let mut book = self.lock();
        let longest = book.series.values().map(Vec::len).max().unwrap_or(0);
        if book.cursor + 1 < longest {
            book.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    /// Make every order and close for `symbol` fail from now on.
    pub fn inject_failure(&self, symbol: &str) {
        self.lock().failing.insert(symbol.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    pub fn position(&self, symbol: &str) -> Option<PaperPosition> {
        self.lock().positions.get(symbol).cloned()
    }

    pub fn fills(&self) -> Vec<PaperFill> {
        self.lock().fills.clone()
    }

    pub fn cash(&self) -> f64 {
        self.lock().cash
    }

    /// Cash plus unrealized PnL at the current candle.
    pub fn equity(&self) -> f64 {
        self.lock().marked_equity()
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn on_scan(&self) -> Result<(), ExchangeError> {
        let first = !std::mem::replace(&mut self.lock().scanned, true);
        if !first && !self.advance() {
            debug!("paper replay exhausted; holding last candle");
        }
        Ok(())
    }

    async fn get_candles(
        &self,
        symbol: &str,
        _interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let book = self.lock();
        let series = book
            .series
            .get(symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?;
        let end = (book.cursor + 1).min(series.len());
        let start = end.saturating_sub(limit);
        Ok(series[start..end].to_vec())
    }

    async fn fetch_equity(&self) -> Result<f64, ExchangeError> {
        Ok(self.lock().cash)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<String, ExchangeError> {
        let mut book = self.lock();
        if book.failing.contains(&order.symbol) {
            return Err(ExchangeError::Unavailable(format!(
                "injected failure for {}",
                order.symbol
            )));
        }
        if order.order_type != OrderType::Market {
            return Err(ExchangeError::Unsupported("paper exchange fills market orders only"));
        }
        if order.quantity.is_nan() || order.quantity <= 0.0 {
            return Err(ExchangeError::Rejected(format!("quantity {}", order.quantity)));
        }
        let price = book.price(&order.symbol)?;

        if order.reduce_only {
            let position_side = book
                .positions
                .get(&order.symbol)
                .map(|p| p.side)
                .ok_or_else(|| ExchangeError::NoPosition(order.symbol.clone()))?;
            if OrderSide::closing(position_side) != order.side {
                return Err(ExchangeError::Rejected(
                    "reduce-only order would increase the position".into(),
                ));
            }
            book.reduce(&order.symbol, order.quantity)?;
        } else {
            let side = match order.side {
                OrderSide::Buy => Side::Long,
                OrderSide::Sell => Side::Short,
            };
            let leverage = order.leverage.max(1.0);
            let needed = order.quantity * price / leverage;
            let available = book.cash - book.used_margin();
            if needed > available {
                return Err(ExchangeError::InsufficientMargin { needed, available });
            }
            match book.positions.get_mut(&order.symbol) {
                Some(existing) if existing.side != side => {
                    return Err(ExchangeError::Rejected(format!(
                        "one-way mode: {} position already open on {}",
                        existing.side, order.symbol
                    )));
                }
                Some(existing) => {
                    let total = existing.quantity + order.quantity;
                    existing.entry_price =
                        (existing.entry_price * existing.quantity + price * order.quantity) / total;
                    existing.quantity = total;
                }
                None => {
                    book.positions.insert(
                        order.symbol.clone(),
                        PaperPosition {
                            side,
                            quantity: order.quantity,
                            entry_price: price,
                            leverage,
                        },
                    );
                }
            }
        }

        let order_id = book.order_id();
        info!(
            %order_id,
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            price,
            reduce_only = order.reduce_only,
            "paper fill"
        );
        book.fills.push(PaperFill {
            order_id: order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price,
            reduce_only: order.reduce_only,
        });
        Ok(order_id)
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<(), ExchangeError> {
        // Market-only book: nothing ever rests.
        if self.lock().series.contains_key(symbol) {
            Ok(())
        } else {
            Err(ExchangeError::UnknownSymbol(symbol.to_string()))
        }
    }

    async fn close_all_positions(&self) -> FlattenReport {
        let mut book = self.lock();
        let symbols: Vec<String> = book.positions.keys().cloned().collect();
        let mut report = FlattenReport::default();
        for symbol in symbols {
            if book.failing.contains(&symbol) {
                report.errors.push(FlattenFailure {
                    symbol: symbol.clone(),
                    error: format!("injected failure for {symbol}"),
                });
                continue;
            }
            let quantity = book.positions.get(&symbol).map_or(0.0, |p| p.quantity);
            match book.reduce(&symbol, quantity) {
                Ok(_) => report.closed.push(symbol),
                Err(e) => report.errors.push(FlattenFailure {
                    symbol,
                    error: e.to_string(),
                }),
            }
        }
        report
    }
}
