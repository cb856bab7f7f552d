//! Regime-filtered trend signal generator.
//!
//! Decision order (first match wins):
//! 1. Too few candles → HOLD, confidence 0.
//! 2. ADX below threshold → HOLD ("ranging market"), whatever the EMAs do.
//! 3. Golden cross with +DI > -DI → LONG, unless RSI is overbought (HOLD, 30).
//! 4. Death cross with -DI > +DI → SHORT, unless RSI is oversold (HOLD, 30).
//! 5. Uptrend with -DI above +DI → CLOSE_LONG; downtrend with +DI above -DI → CLOSE_SHORT.
//! 6. Otherwise HOLD, confidence 40, reporting the prevailing bias.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Candle;
use crate::indicators::adx::DEFAULT_ADX_PERIOD;
use crate::indicators::atr::DEFAULT_ATR_PERIOD;
use crate::indicators::rsi::DEFAULT_RSI_PERIOD;
use crate::indicators::{adx, atr, ema, rsi, Macd};

use super::config::TrendSignalConfig;
use super::regime::{classify_regime, Regime};

const VETO_CONFIDENCE: f64 = 30.0;
const BIAS_CONFIDENCE: f64 = 40.0;
const EXIT_CONFIDENCE: f64 = 50.0;
const MAX_ENTRY_CONFIDENCE: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    Long,
    Short,
    CloseLong,
    CloseShort,
    Hold,
}

impl SignalAction {
    pub fn is_entry(&self) -> bool {
        matches!(self, SignalAction::Long | SignalAction::Short)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, SignalAction::CloseLong | SignalAction::CloseShort)
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalAction::Long => "LONG",
            SignalAction::Short => "SHORT",
            SignalAction::CloseLong => "CLOSE_LONG",
            SignalAction::CloseShort => "CLOSE_SHORT",
            SignalAction::Hold => "HOLD",
        };
        write!(f, "{s}")
    }
}

/// Indicator values at the latest candle, plus the previous EMA pair for
/// crossover detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub fast_ema: f64,
    pub slow_ema: f64,
    pub prev_fast_ema: f64,
    pub prev_slow_ema: f64,
    pub rsi: f64,
    pub atr: f64,
    /// ATR as a percentage of price.
    pub atr_pct: f64,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub macd_histogram: f64,
}

impl IndicatorSnapshot {
    pub fn is_golden_cross(&self) -> bool {
        self.prev_fast_ema <= self.prev_slow_ema && self.fast_ema > self.slow_ema
    }

    pub fn is_death_cross(&self) -> bool {
        self.prev_fast_ema >= self.prev_slow_ema && self.fast_ema < self.slow_ema
    }
}

/// A directional signal with confidence and optional protective levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub action: SignalAction,
    pub reason: String,
    pub regime: Regime,
    pub adx_value: f64,
    /// 0..=100
    pub confidence: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// None when there was not enough data to compute indicators.
    pub indicators: Option<IndicatorSnapshot>,
}

impl TrendSignal {
    fn hold(reason: impl Into<String>, confidence: f64, snapshot: &IndicatorSnapshot) -> Self {
        Self {
            action: SignalAction::Hold,
            reason: reason.into(),
            regime: classify_regime(snapshot.adx, snapshot.atr_pct),
            adx_value: snapshot.adx,
            confidence,
            stop_loss: None,
            take_profit: None,
            indicators: Some(snapshot.clone()),
        }
    }

    fn insufficient_data(have: usize, need: usize) -> Self {
        Self {
            action: SignalAction::Hold,
            reason: format!("insufficient data: {have} candles, need {need}"),
            regime: Regime::Ranging,
            adx_value: 0.0,
            confidence: 0.0,
            stop_loss: None,
            take_profit: None,
            indicators: None,
        }
    }
}

/// Stateless trend signal generator. Each call recomputes indicators from the
/// candles it is given.
#[derive(Debug, Clone, Default)]
pub struct TrendSignalGenerator {
    config: TrendSignalConfig,
}

impl TrendSignalGenerator {
    pub fn new(config: TrendSignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendSignalConfig {
        &self.config
    }

    /// Evaluate the latest candle of an oldest-first sequence.
    pub fn generate(&self, candles: &[Candle]) -> TrendSignal {
        match self.snapshot(candles) {
            Some(snapshot) => self.decide(&snapshot),
            None => TrendSignal::insufficient_data(candles.len(), self.config.min_candles()),
        }
    }

    /// Compute the indicator snapshot at the latest candle, or None when the
    /// sequence is shorter than `min_candles()`.
    pub fn snapshot(&self, candles: &[Candle]) -> Option<IndicatorSnapshot> {
        let n = candles.len();
        if n < self.config.min_candles() || n < 2 {
            return None;
        }

        let fast = ema(candles, self.config.fast_period);
        let slow = ema(candles, self.config.slow_period);
        let rsi = rsi(candles, DEFAULT_RSI_PERIOD);
        let atr = atr(candles, DEFAULT_ATR_PERIOD);
        let di = adx(candles, DEFAULT_ADX_PERIOD);
        let macd = Macd::default().compute(candles);

        let last = n - 1;
        let price = candles[last].close;
        let atr_pct = if price > 0.0 {
            atr[last] / price * 100.0
        } else {
            0.0
        };

        Some(IndicatorSnapshot {
            price,
            fast_ema: fast[last],
            slow_ema: slow[last],
            prev_fast_ema: fast[last - 1],
            prev_slow_ema: slow[last - 1],
            rsi: rsi[last],
            atr: atr[last],
            atr_pct,
            adx: di.adx[last],
            plus_di: di.plus_di[last],
            minus_di: di.minus_di[last],
            macd_histogram: macd.histogram[last],
        })
    }

    /// Turn an indicator snapshot into a signal.
    pub fn decide(&self, s: &IndicatorSnapshot) -> TrendSignal {
        let cfg = &self.config;
        let regime = classify_regime(s.adx, s.atr_pct);

        if s.adx < cfg.adx_threshold {
            return TrendSignal::hold(
                format!(
                    "ranging market: ADX {:.1} below threshold {:.1}",
                    s.adx, cfg.adx_threshold
                ),
                0.0,
                s,
            );
        }

        let entry_confidence = (50.0 + 2.0 * (s.adx - cfg.adx_threshold)).min(MAX_ENTRY_CONFIDENCE);

        if s.is_golden_cross() && s.plus_di > s.minus_di {
            if s.rsi > cfg.rsi_overbought {
                return TrendSignal::hold(
                    format!(
                        "golden cross vetoed: RSI {:.1} above overbought {:.1}",
                        s.rsi, cfg.rsi_overbought
                    ),
                    VETO_CONFIDENCE,
                    s,
                );
            }
            return TrendSignal {
                action: SignalAction::Long,
                reason: format!(
                    "golden cross: EMA{} above EMA{}, ADX {:.1}, +DI {:.1} > -DI {:.1}",
                    cfg.fast_period, cfg.slow_period, s.adx, s.plus_di, s.minus_di
                ),
                regime,
                adx_value: s.adx,
                confidence: entry_confidence,
                stop_loss: Some(s.price - cfg.atr_multiplier_sl * s.atr),
                take_profit: Some(s.price + cfg.atr_multiplier_tp * s.atr),
                indicators: Some(s.clone()),
            };
        }

        if s.is_death_cross() && s.minus_di > s.plus_di {
            if s.rsi < cfg.rsi_oversold {
                return TrendSignal::hold(
                    format!(
                        "death cross vetoed: RSI {:.1} below oversold {:.1}",
                        s.rsi, cfg.rsi_oversold
                    ),
                    VETO_CONFIDENCE,
                    s,
                );
            }
            return TrendSignal {
                action: SignalAction::Short,
                reason: format!(
                    "death cross: EMA{} below EMA{}, ADX {:.1}, -DI {:.1} > +DI {:.1}",
                    cfg.fast_period, cfg.slow_period, s.adx, s.minus_di, s.plus_di
                ),
                regime,
                adx_value: s.adx,
                confidence: entry_confidence,
                stop_loss: Some(s.price + cfg.atr_multiplier_sl * s.atr),
                take_profit: Some(s.price - cfg.atr_multiplier_tp * s.atr),
                indicators: Some(s.clone()),
            };
        }

        let uptrend = s.fast_ema > s.slow_ema;
        let downtrend = s.fast_ema < s.slow_ema;

        if uptrend && s.minus_di > s.plus_di {
            return TrendSignal {
                action: SignalAction::CloseLong,
                reason: format!(
                    "trend weakening: -DI {:.1} overtook +DI {:.1} in uptrend",
                    s.minus_di, s.plus_di
                ),
                regime,
                adx_value: s.adx,
                confidence: EXIT_CONFIDENCE,
                stop_loss: None,
                take_profit: None,
                indicators: Some(s.clone()),
            };
        }

        if downtrend && s.plus_di > s.minus_di {
            return TrendSignal {
                action: SignalAction::CloseShort,
                reason: format!(
                    "trend weakening: +DI {:.1} overtook -DI {:.1} in downtrend",
                    s.plus_di, s.minus_di
                ),
                regime,
                adx_value: s.adx,
                confidence: EXIT_CONFIDENCE,
                stop_loss: None,
                take_profit: None,
                indicators: Some(s.clone()),
            };
        }

        let bias = if uptrend {
            "bullish"
        } else if downtrend {
            "bearish"
        } else {
            "neutral"
        };
        TrendSignal::hold(
            format!("no fresh crossover, {bias} bias (ADX {:.1})", s.adx),
            BIAS_CONFIDENCE,
            s,
        )
    }
}
