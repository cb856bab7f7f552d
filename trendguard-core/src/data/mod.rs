//! Candle sources that need no I/O.

pub mod synthetic;

pub use synthetic::{synthetic_candles, synthetic_origin};
