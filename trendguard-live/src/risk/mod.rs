//! Risk management: sizing, the pre-trade gate, drawdown halts, the kill
//! switch and the heartbeat dead-man's switch.

pub mod config;
pub mod events;
pub mod manager;
pub mod sizing;
pub mod state;

pub use config::{RiskConfig, RiskConfigError};
pub use events::{DrawdownScope, RiskEvent};
pub use manager::{OpenRequest, RejectReason, RiskError, RiskManager, TradeCheck};
pub use sizing::{kelly_pct, Sizing, SizingMethod};
pub use state::{EquitySample, Halt, HaltKind, PositionState, RiskSnapshot, RiskState, TradeStats};
