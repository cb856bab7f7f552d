//! Fire-and-forget delivery of risk events.
//!
//! The risk actor and the scan loop hand events to a
//! [`NotificationDispatcher`], which queues them on an unbounded channel for a
//! background task. Delivery failures are logged there and never reach the
//! risk core.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::risk::RiskEvent;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &RiskEvent) -> anyhow::Result<()>;
}

/// Renders every event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &RiskEvent) -> anyhow::Result<()> {
        match event {
            RiskEvent::TradeOpened {
                symbol,
                side,
                quantity,
                price,
                leverage,
                ..
            } => info!(
                event = event.kind(),
                %symbol, %side, quantity, price, leverage, "trade opened"
            ),
            RiskEvent::TradeClosed {
                symbol,
                side,
                exit_price,
                pnl,
                ..
            } => info!(event = event.kind(), %symbol, %side, exit_price, pnl, "trade closed"),
            RiskEvent::DrawdownBreach {
                scope, value, limit, ..
            } => warn!(
                event = event.kind(),
                %scope,
                drawdown_pct = value * 100.0,
                limit_pct = limit * 100.0,
                "drawdown limit breached"
            ),
            RiskEvent::HeartbeatTimeout { silent_ms, .. } => {
                error!(event = event.kind(), silent_ms, "heartbeat timeout")
            }
            RiskEvent::KillSwitchActivated { reason, .. } => {
                error!(event = event.kind(), %reason, "kill switch activated")
            }
            RiskEvent::Summary { tick, snapshot } => info!(
                event = event.kind(),
                tick,
                equity = snapshot.current_equity,
                total_pnl = snapshot.total_pnl,
                open_positions = snapshot.positions.len(),
                drawdown_pct = snapshot.current_drawdown * 100.0,
                halted = snapshot.halt.is_some(),
                "periodic summary"
            ),
        }
        Ok(())
    }
}

/// Cheap-to-clone sending side of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<RiskEvent>,
}

impl NotificationDispatcher {
    /// Spawn the delivery task. It exits once every dispatcher clone is dropped
    /// and the queue is drained.
    pub fn spawn(notifier: Arc<dyn Notifier>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<RiskEvent>();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = notifier.notify(&event).await {
                    warn!(error = %e, event = event.kind(), "notification delivery failed");
                }
            }
            debug!("notification dispatcher stopped");
        });
        (Self { tx }, task)
    }

    pub fn notify(&self, event: RiskEvent) {
        if self.tx.send(event).is_err() {
            warn!("notification dispatcher is gone; event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn notify(&self, event: &RiskEvent) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.kind().to_string());
            if matches!(event, RiskEvent::HeartbeatTimeout { .. }) {
                anyhow::bail!("transport down");
            }
            Ok(())
        }
    }

    fn at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn delivers_in_order_and_survives_failures() {
        let recording = Arc::new(Recording::default());
        let (dispatcher, task) = NotificationDispatcher::spawn(recording.clone());

        dispatcher.notify(RiskEvent::HeartbeatTimeout { silent_ms: 1, at: at() });
        dispatcher.notify(RiskEvent::KillSwitchActivated {
            reason: "test".into(),
            at: at(),
        });
        drop(dispatcher);
        task.await.unwrap();

        let seen = recording.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["heartbeat_timeout", "kill_switch_activated"]);
    }

    #[tokio::test]
    async fn log_notifier_accepts_every_event() {
        let event = RiskEvent::KillSwitchActivated {
            reason: "test".into(),
            at: at(),
        };
        assert!(LogNotifier.notify(&event).await.is_ok());
    }
}
