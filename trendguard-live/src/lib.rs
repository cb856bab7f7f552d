//! TrendGuard Live: risk management and the live scan loop.
//!
//! This crate builds on `trendguard-core` and `trendguard-runner` to provide:
//! - The risk manager state machine (sizing, pre-trade gate, drawdown halts,
//!   kill switch, heartbeat dead-man's switch)
//! - A risk actor that owns the manager and serializes every mutation
//! - The heartbeat monitor and the scan-loop orchestrator
//! - Exchange and notifier collaborator traits, a replay paper exchange and a
//!   log-only notifier
//! - Bounded, explicitly owned history stores

pub mod actor;
pub mod clock;
pub mod exchange;
pub mod heartbeat;
pub mod history;
pub mod notify;
pub mod orchestrator;
pub mod risk;

pub use actor::{spawn_risk_actor, ActorError, ActorHooks, KillSwitchHandler, RiskHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use exchange::{
    Exchange, ExchangeError, FlattenOnKillSwitch, FlattenReport, OrderRequest, OrderSide,
    PaperExchange,
};
pub use heartbeat::spawn_heartbeat_monitor;
pub use history::{BoundedHistory, SignalHistory, SignalRecord};
pub use notify::{LogNotifier, NotificationDispatcher, Notifier};
pub use orchestrator::{LiveRunner, RunReport, ScanConfig, ScanConfigError, ScanReport};
pub use risk::{
    RejectReason, RiskConfig, RiskError, RiskEvent, RiskManager, RiskSnapshot, TradeCheck,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn manager_moves_into_actor_task() {
        assert_send::<RiskManager>();
        assert_send::<RiskHandle>();
        assert_sync::<RiskHandle>();
    }

    #[test]
    fn collaborators_are_send_sync() {
        assert_send::<PaperExchange>();
        assert_sync::<PaperExchange>();
        assert_send::<LiveRunner>();
        assert_sync::<LiveRunner>();
        assert_send::<RiskSnapshot>();
        assert_sync::<RiskSnapshot>();
    }
}
