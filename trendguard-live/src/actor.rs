//! The risk actor: sole owner of the [`RiskManager`].
//!
//! The scan loop, the heartbeat monitor and any operator tooling talk to it
//! through a cloneable [`RiskHandle`]. Commands are processed one at a time,
//! so a sizing decision can never interleave with an equity refresh or a
//! heartbeat-triggered kill switch.
//!
//! After every command the actor drains the manager's queued events. Each one
//! goes to the notifier; a `KillSwitchActivated` additionally invokes the
//! registered [`KillSwitchHandler`] before the command's reply is sent.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use trendguard_core::Side;

use crate::notify::NotificationDispatcher;
use crate::risk::{
    OpenRequest, PositionState, RiskError, RiskEvent, RiskManager, RiskSnapshot, Sizing,
    TradeCheck,
};

const COMMAND_BUFFER: usize = 64;

/// Invoked once per kill-switch activation, typically to flatten the venue.
///
/// Errors are logged by the actor. They never unlatch the kill switch.
#[async_trait]
pub trait KillSwitchHandler: Send + Sync {
    async fn on_kill_switch(&self, reason: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActorError {
    #[error("risk actor is no longer running")]
    Closed,
}

/// Commands sent to the risk actor. Every command carries a reply channel.
#[derive(Debug)]
pub enum RiskCommand {
    CheckTrade {
        symbol: String,
        side: Side,
        quantity: f64,
        price: f64,
        leverage: f64,
        reply: oneshot::Sender<TradeCheck>,
    },
    SizeEntry {
        price: f64,
        stop_loss: Option<f64>,
        leverage: f64,
        reply: oneshot::Sender<Sizing>,
    },
    OpenPosition {
        request: OpenRequest,
        reply: oneshot::Sender<Result<(), RiskError>>,
    },
    ClosePosition {
        symbol: String,
        exit_price: f64,
        reply: oneshot::Sender<Result<f64, RiskError>>,
    },
    UpdateEquity {
        equity: f64,
        reply: oneshot::Sender<()>,
    },
    Heartbeat {
        reply: oneshot::Sender<()>,
    },
    CheckHeartbeat {
        reply: oneshot::Sender<bool>,
    },
    TriggerKillSwitch {
        reason: String,
        reply: oneshot::Sender<bool>,
    },
    ResetKillSwitch {
        reseed_equity: Option<f64>,
        reply: oneshot::Sender<()>,
    },
    ClearWeeklyReduction {
        reply: oneshot::Sender<()>,
    },
    Position {
        symbol: String,
        reply: oneshot::Sender<Option<PositionState>>,
    },
    Snapshot {
        reply: oneshot::Sender<RiskSnapshot>,
    },
}

/// Collaborators the actor forwards events to.
#[derive(Default)]
pub struct ActorHooks {
    pub notifier: Option<NotificationDispatcher>,
    pub kill_switch_handler: Option<Arc<dyn KillSwitchHandler>>,
}

struct RiskActor {
    manager: RiskManager,
    hooks: ActorHooks,
}

impl RiskActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RiskCommand>) -> RiskManager {
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        debug!("risk actor stopped");
        self.manager
    }

    async fn handle(&mut self, command: RiskCommand) {
        let m = &mut self.manager;
        match command {
            RiskCommand::CheckTrade {
                symbol,
                side,
                quantity,
                price,
                leverage,
                reply,
            } => {
                let out = m.check_trade(&symbol, side, quantity, price, leverage);
                self.flush_events().await;
                let _ = reply.send(out);
            }
            RiskCommand::SizeEntry {
                price,
                stop_loss,
                leverage,
                reply,
            } => {
                let _ = reply.send(m.size_entry(price, stop_loss, leverage));
            }
            RiskCommand::OpenPosition { request, reply } => {
                let out = m.open_position(request);
                self.flush_events().await;
                let _ = reply.send(out);
            }
            RiskCommand::ClosePosition {
                symbol,
                exit_price,
                reply,
            } => {
                let out = m.close_position(&symbol, exit_price);
                self.flush_events().await;
                let _ = reply.send(out);
            }
            RiskCommand::UpdateEquity { equity, reply } => {
                m.update_equity(equity);
                self.flush_events().await;
                let _ = reply.send(());
            }
            RiskCommand::Heartbeat { reply } => {
                m.heartbeat();
                let _ = reply.send(());
            }
            RiskCommand::CheckHeartbeat { reply } => {
                let fired = m.check_heartbeat();
                self.flush_events().await;
                let _ = reply.send(fired);
            }
            RiskCommand::TriggerKillSwitch { reason, reply } => {
                let latched = m.trigger_kill_switch(&reason);
                self.flush_events().await;
                let _ = reply.send(latched);
            }
            RiskCommand::ResetKillSwitch {
                reseed_equity,
                reply,
            } => {
                m.reset_kill_switch(reseed_equity);
                let _ = reply.send(());
            }
            RiskCommand::ClearWeeklyReduction { reply } => {
                m.clear_weekly_reduction();
                let _ = reply.send(());
            }
            RiskCommand::Position { symbol, reply } => {
                let _ = reply.send(m.position(&symbol).cloned());
            }
            RiskCommand::Snapshot { reply } => {
                let _ = reply.send(m.snapshot());
            }
        }
    }

    async fn flush_events(&mut self) {
        for event in self.manager.drain_events() {
            if let RiskEvent::KillSwitchActivated { reason, .. } = &event {
                match &self.hooks.kill_switch_handler {
                    Some(handler) => {
                        info!(%reason, "invoking kill switch handler");
                        if let Err(e) = handler.on_kill_switch(reason).await {
                            error!(error = %e, "kill switch handler failed; switch stays latched");
                        }
                    }
                    None => error!(%reason, "kill switch latched with no handler registered"),
                }
            }
            if let Some(notifier) = &self.hooks.notifier {
                notifier.notify(event);
            }
        }
    }
}

/// Move `manager` into a spawned actor task.
///
/// The task ends when every [`RiskHandle`] is dropped and returns the manager.
pub fn spawn_risk_actor(
    manager: RiskManager,
    hooks: ActorHooks,
) -> (RiskHandle, JoinHandle<RiskManager>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let actor = RiskActor { manager, hooks };
    let task = tokio::spawn(actor.run(rx));
    (RiskHandle { tx }, task)
}

#[derive(Debug, Clone)]
pub struct RiskHandle {
    tx: mpsc::Sender<RiskCommand>,
}

impl RiskHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RiskCommand,
    ) -> Result<T, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ActorError::Closed)?;
        rx.await.map_err(|_| ActorError::Closed)
    }

    pub async fn check_trade(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
        leverage: f64,
    ) -> Result<TradeCheck, ActorError> {
        let symbol = symbol.to_string();
        self.request(|reply| RiskCommand::CheckTrade {
            symbol,
            side,
            quantity,
            price,
            leverage,
            reply,
        })
        .await
    }

    pub async fn size_entry(
        &self,
        price: f64,
        stop_loss: Option<f64>,
        leverage: f64,
    ) -> Result<Sizing, ActorError> {
        self.request(|reply| RiskCommand::SizeEntry {
            price,
            stop_loss,
            leverage,
            reply,
        })
        .await
    }

    pub async fn open_position(
        &self,
        request: OpenRequest,
    ) -> Result<Result<(), RiskError>, ActorError> {
        self.request(|reply| RiskCommand::OpenPosition { request, reply })
            .await
    }

    pub async fn close_position(
        &self,
        symbol: &str,
        exit_price: f64,
    ) -> Result<Result<f64, RiskError>, ActorError> {
        let symbol = symbol.to_string();
        self.request(|reply| RiskCommand::ClosePosition {
            symbol,
            exit_price,
            reply,
        })
        .await
    }

    pub async fn update_equity(&self, equity: f64) -> Result<(), ActorError> {
        self.request(|reply| RiskCommand::UpdateEquity { equity, reply })
            .await
    }

    pub async fn heartbeat(&self) -> Result<(), ActorError> {
        self.request(|reply| RiskCommand::Heartbeat { reply }).await
    }

    /// Returns `true` when this check fired the kill switch.
    pub async fn check_heartbeat(&self) -> Result<bool, ActorError> {
        self.request(|reply| RiskCommand::CheckHeartbeat { reply })
            .await
    }

    /// Returns `true` when this call latched the kill switch.
    pub async fn trigger_kill_switch(&self, reason: &str) -> Result<bool, ActorError> {
        let reason = reason.to_string();
        self.request(|reply| RiskCommand::TriggerKillSwitch { reason, reply })
            .await
    }

    pub async fn reset_kill_switch(&self, reseed_equity: Option<f64>) -> Result<(), ActorError> {
        self.request(|reply| RiskCommand::ResetKillSwitch {
            reseed_equity,
            reply,
        })
        .await
    }

    pub async fn clear_weekly_reduction(&self) -> Result<(), ActorError> {
        self.request(|reply| RiskCommand::ClearWeeklyReduction { reply })
            .await
    }

    pub async fn position(&self, symbol: &str) -> Result<Option<PositionState>, ActorError> {
        let symbol = symbol.to_string();
        self.request(|reply| RiskCommand::Position { symbol, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<RiskSnapshot, ActorError> {
        self.request(|reply| RiskCommand::Snapshot { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::risk::RiskConfig;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl KillSwitchHandler for Counting {
        async fn on_kill_switch(&self, _reason: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("venue unreachable");
            }
            Ok(())
        }
    }

    fn spawn_with(fail: bool) -> (RiskHandle, JoinHandle<RiskManager>, Arc<Counting>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap(),
        ));
        let manager = RiskManager::new(RiskConfig::default(), 1000.0, clock).unwrap();
        let handler = Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail,
        });
        let hooks = ActorHooks {
            notifier: None,
            kill_switch_handler: Some(handler.clone()),
        };
        let (handle, task) = spawn_risk_actor(manager, hooks);
        (handle, task, handler)
    }

    #[tokio::test]
    async fn kill_switch_handler_runs_once() {
        let (handle, _task, handler) = spawn_with(false);
        assert!(handle.trigger_kill_switch("manual").await.unwrap());
        assert!(!handle.trigger_kill_switch("manual again").await.unwrap());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_failure_keeps_latch() {
        let (handle, _task, handler) = spawn_with(true);
        handle.trigger_kill_switch("manual").await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.kill_switch_active);
    }

    #[tokio::test]
    async fn actor_returns_manager_when_handles_drop() {
        let (handle, task, _) = spawn_with(false);
        handle
            .open_position(OpenRequest {
                symbol: "BTCUSDT".into(),
                side: Side::Long,
                quantity: 1.0,
                entry_price: 100.0,
                leverage: 1.0,
                stop_loss: None,
                take_profit: None,
            })
            .await
            .unwrap()
            .unwrap();
        drop(handle);
        let manager = task.await.unwrap();
        assert!(manager.position("BTCUSDT").is_some());
    }

    #[tokio::test]
    async fn closed_actor_reports_error() {
        let (handle, task, _) = spawn_with(false);
        task.abort();
        let _ = task.await;
        assert_eq!(handle.heartbeat().await, Err(ActorError::Closed));
    }
}
