//! The live scan loop.
//!
//! [`LiveRunner`] wires the pieces together: it spawns the notification
//! dispatcher, the risk actor (with a flatten-on-kill-switch handler), the
//! heartbeat monitor and then drives the scan timer. Each scan refreshes
//! equity, evaluates every symbol and, only when the scan completes, stamps
//! the heartbeat.
//!
//! Shutdown suppresses future ticks only. An order already handed to the
//! exchange is allowed to finish and be recorded.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use trendguard_core::{Side, SignalAction, TrendSignal, TrendSignalGenerator};

use crate::actor::{spawn_risk_actor, ActorHooks, RiskHandle};
use crate::exchange::{Exchange, FlattenOnKillSwitch, OrderRequest, OrderSide};
use crate::heartbeat::spawn_heartbeat_monitor;
use crate::history::{SignalHistory, SignalRecord, DEFAULT_HISTORY_CAPACITY};
use crate::notify::{NotificationDispatcher, Notifier};
use crate::risk::{OpenRequest, RiskEvent, RiskManager, RiskSnapshot, TradeCheck};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub symbols: Vec<String>,
    pub interval: String,
    /// Candles requested per symbol per scan.
    pub candle_limit: usize,
    pub scan_interval_ms: u64,
    /// Emit a summary notification every this many ticks; 0 disables.
    pub summary_every_ticks: u64,
    /// Stop after this many ticks; `None` runs until shutdown.
    pub max_ticks: Option<u64>,
    pub signal_history_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            interval: "1h".to_string(),
            candle_limit: 200,
            scan_interval_ms: 60_000,
            summary_every_ticks: 60,
            max_ticks: None,
            signal_history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScanConfigError {
    #[error("symbols must not be empty")]
    NoSymbols,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ScanConfigError> {
        if self.symbols.is_empty() {
            return Err(ScanConfigError::NoSymbols);
        }
        if self.scan_interval_ms == 0 {
            return Err(ScanConfigError::Zero("scan_interval_ms"));
        }
        if self.candle_limit == 0 {
            return Err(ScanConfigError::Zero("candle_limit"));
        }
        Ok(())
    }
}

/// What one scan did, per symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    pub rejected: Vec<(String, String)>,
    /// Symbols whose exchange call failed; risk state was left untouched.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub ticks: u64,
    pub failed_scans: u64,
    pub snapshot: RiskSnapshot,
    pub signals: SignalHistory,
}

pub struct LiveRunner {
    exchange: Arc<dyn Exchange>,
    generator: TrendSignalGenerator,
    config: ScanConfig,
}

impl LiveRunner {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        generator: TrendSignalGenerator,
        config: ScanConfig,
    ) -> Self {
        Self {
            exchange,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run until `max_ticks` or until `shutdown` flips to `true`.
    pub async fn run(
        &self,
        manager: RiskManager,
        notifier: Arc<dyn Notifier>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<RunReport> {
        self.config.validate().context("invalid scan config")?;
        let heartbeat_every = Duration::from_millis(manager.config().heartbeat_interval_ms);
        let (dispatcher, dispatch_task) = NotificationDispatcher::spawn(notifier);
        let hooks = ActorHooks {
            notifier: Some(dispatcher.clone()),
            kill_switch_handler: Some(Arc::new(FlattenOnKillSwitch::new(self.exchange.clone()))),
        };
        let (risk, actor_task) = spawn_risk_actor(manager, hooks);

        let (stop_tx, stop_rx) = watch::channel(false);
        let monitor = spawn_heartbeat_monitor(risk.clone(), heartbeat_every, stop_rx);

        info!(
            symbols = ?self.config.symbols,
            interval_ms = self.config.scan_interval_ms,
            "live loop started"
        );

        let mut signals = SignalHistory::new(self.config.signal_history_capacity);
        let mut ticker = interval(Duration::from_millis(self.config.scan_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0u64;
        let mut failed_scans = 0u64;

        loop {
            if self.config.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(ticks, "shutdown requested");
                        break;
                    }
                    continue;
                }
            }

            ticks += 1;
            match self.scan_once(&risk, &mut signals).await {
                Ok(report) => {
                    debug!(tick = ticks, ?report, "scan complete");
                    risk.heartbeat().await.context("risk actor stopped")?;
                }
                Err(e) => {
                    failed_scans += 1;
                    warn!(tick = ticks, error = %e, "scan failed; heartbeat not stamped");
                }
            }

            let every = self.config.summary_every_ticks;
            if every > 0 && ticks % every == 0 {
                let snapshot = risk.snapshot().await.context("risk actor stopped")?;
                dispatcher.notify(RiskEvent::Summary {
                    tick: ticks,
                    snapshot: Box::new(snapshot),
                });
            }
        }

        let _ = stop_tx.send(true);
        monitor.await.context("heartbeat monitor panicked")?;

        let snapshot = risk.snapshot().await.context("risk actor stopped")?;
        drop(risk);
        actor_task.await.context("risk actor panicked")?;
        drop(dispatcher);
        dispatch_task.await.context("notification dispatcher panicked")?;

        info!(
            ticks,
            failed_scans,
            equity = snapshot.current_equity,
            total_pnl = snapshot.total_pnl,
            "live loop stopped"
        );
        Ok(RunReport {
            ticks,
            failed_scans,
            snapshot,
            signals,
        })
    }

    /// One pass over every symbol. Errors only when equity cannot be refreshed
    /// or the risk actor is gone; per-symbol failures are reported, not raised.
    pub async fn scan_once(
        &self,
        risk: &RiskHandle,
        signals: &mut SignalHistory,
    ) -> anyhow::Result<ScanReport> {
        self.exchange.on_scan().await.context("exchange scan hook")?;
        let equity = self
            .exchange
            .fetch_equity()
            .await
            .context("fetching equity")?;
        risk.update_equity(equity).await?;

        let mut report = ScanReport::default();
        for symbol in &self.config.symbols {
            let candles = match self
                .exchange
                .get_candles(symbol, &self.config.interval, self.config.candle_limit)
                .await
            {
                Ok(candles) => candles,
                Err(e) => {
                    warn!(%symbol, error = %e, "candle fetch failed");
                    report.failed.push((symbol.clone(), e.to_string()));
                    continue;
                }
            };
            let Some(last) = candles.last() else {
                continue;
            };
            let price = last.close;
            let signal = self.generator.generate(&candles);
            signals.record(
                symbol,
                SignalRecord {
                    at: last.timestamp,
                    price,
                    signal: signal.clone(),
                },
            );

            self.act(risk, symbol, price, &signal, &mut report).await?;
        }
        Ok(report)
    }

    async fn act(
        &self,
        risk: &RiskHandle,
        symbol: &str,
        price: f64,
        signal: &TrendSignal,
        report: &mut ScanReport,
    ) -> anyhow::Result<()> {
        let position = risk.position(symbol).await?;
        match (signal.action, position) {
            (SignalAction::Long, None) => {
                self.enter(risk, symbol, Side::Long, price, signal, report)
                    .await?
            }
            (SignalAction::Short, None) => {
                self.enter(risk, symbol, Side::Short, price, signal, report)
                    .await?
            }
            (SignalAction::CloseLong, Some(p)) if p.side == Side::Long => {
                self.exit(risk, symbol, p.side, p.quantity, p.leverage, price, report)
                    .await?
            }
            (SignalAction::CloseShort, Some(p)) if p.side == Side::Short => {
                self.exit(risk, symbol, p.side, p.quantity, p.leverage, price, report)
                    .await?
            }
            _ => {}
        }
        Ok(())
    }

    async fn enter(
        &self,
        risk: &RiskHandle,
        symbol: &str,
        side: Side,
        price: f64,
        signal: &TrendSignal,
        report: &mut ScanReport,
    ) -> anyhow::Result<()> {
        let leverage = self.generator.config().leverage;
        let sizing = risk.size_entry(price, signal.stop_loss, leverage).await?;
        if sizing.quantity <= 0.0 {
            debug!(%symbol, method = ?sizing.method, "entry sized to zero; skipping");
            return Ok(());
        }

        let quantity = match risk
            .check_trade(symbol, side, sizing.quantity, price, leverage)
            .await?
        {
            TradeCheck::Allowed { quantity } | TradeCheck::Reduced { quantity, .. } => quantity,
            TradeCheck::Rejected { reason } => {
                info!(%symbol, %side, %reason, "entry rejected by risk gate");
                report.rejected.push((symbol.to_string(), reason.to_string()));
                return Ok(());
            }
        };

        let order = OrderRequest::market(symbol, OrderSide::opening(side), quantity, leverage)
            .with_protection(signal.stop_loss, signal.take_profit);
        match self.exchange.place_order(&order).await {
            Ok(order_id) => {
                info!(%symbol, %side, quantity, price, %order_id, confidence = signal.confidence, "entry filled");
                let recorded = risk
                    .open_position(OpenRequest {
                        symbol: symbol.to_string(),
                        side,
                        quantity,
                        entry_price: price,
                        leverage,
                        stop_loss: signal.stop_loss,
                        take_profit: signal.take_profit,
                    })
                    .await?;
                match recorded {
                    Ok(()) => report.opened.push(symbol.to_string()),
                    Err(e) => warn!(%symbol, error = %e, "filled entry could not be recorded"),
                }
            }
            Err(e) => {
                warn!(%symbol, %side, error = %e, "entry order failed; position not recorded");
                report.failed.push((symbol.to_string(), e.to_string()));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn exit(
        &self,
        risk: &RiskHandle,
        symbol: &str,
        side: Side,
        quantity: f64,
        leverage: f64,
        price: f64,
        report: &mut ScanReport,
    ) -> anyhow::Result<()> {
        let order = OrderRequest::market(symbol, OrderSide::closing(side), quantity, leverage)
            .reduce_only();
        match self.exchange.place_order(&order).await {
            Ok(order_id) => {
                match risk.close_position(symbol, price).await? {
                    Ok(pnl) => {
                        info!(%symbol, %side, pnl, %order_id, "exit filled");
                        report.closed.push(symbol.to_string());
                    }
                    Err(e) => warn!(%symbol, error = %e, "filled exit could not be recorded"),
                }
            }
            Err(e) => {
                warn!(%symbol, %side, error = %e, "exit order failed; position kept");
                report.failed.push((symbol.to_string(), e.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_config_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.candle_limit, 200);
        assert_eq!(config.max_ticks, None);
        assert_eq!(config.symbols.len(), 2);
    }

    #[test]
    fn scan_config_partial_override() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"symbols": ["SOLUSDT"], "max_ticks": 5}"#).unwrap();
        assert_eq!(config.symbols, vec!["SOLUSDT".to_string()]);
        assert_eq!(config.max_ticks, Some(5));
        assert_eq!(config.interval, "1h");
    }

    #[test]
    fn scan_config_rejects_zero_interval() {
        assert_eq!(ScanConfig::default().validate(), Ok(()));

        let config = ScanConfig {
            scan_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ScanConfigError::Zero("scan_interval_ms"))
        );

        let config = ScanConfig {
            symbols: Vec::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ScanConfigError::NoSymbols));
    }
}
