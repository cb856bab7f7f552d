//! Market regime classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// ADX at or above this is a trending market.
pub const TRENDING_ADX: f64 = 25.0;
/// ADX at or below this is a ranging market.
pub const RANGING_ADX: f64 = 15.0;
/// Between the two ADX bands, ATR above this percentage of price is volatile.
pub const VOLATILE_ATR_PCT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Trending,
    Ranging,
    Volatile,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Trending => write!(f, "trending"),
            Regime::Ranging => write!(f, "ranging"),
            Regime::Volatile => write!(f, "volatile"),
        }
    }
}

/// Classify the regime from ADX and ATR as a percentage of price.
pub fn classify_regime(adx: f64, atr_pct: f64) -> Regime {
    if adx >= TRENDING_ADX {
        Regime::Trending
    } else if adx <= RANGING_ADX {
        Regime::Ranging
    } else if atr_pct > VOLATILE_ATR_PCT {
        Regime::Volatile
    } else {
        Regime::Ranging
    }
}
