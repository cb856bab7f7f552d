//! Dead-man's switch monitor.
//!
//! Periodically asks the risk actor to compare the last heartbeat against the
//! configured timeout. The actor fires the kill switch on timeout; the
//! monitor only provides the ticking.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::actor::RiskHandle;

pub fn spawn_heartbeat_monitor(
    risk: RiskHandle,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match risk.check_heartbeat().await {
                Ok(true) => error!("heartbeat timeout: kill switch fired"),
                Ok(false) => {}
                Err(e) => {
                    debug!(error = %e, "heartbeat monitor exiting");
                    break;
                }
            }
        }
        debug!("heartbeat monitor stopped");
    })
}
