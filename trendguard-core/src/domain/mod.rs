//! Domain types for TrendGuard

pub mod candle;
pub mod side;

pub use candle::{closes, validate_candles, Candle, CandleError};
pub use side::Side;

/// Symbol type alias
pub type Symbol = String;
