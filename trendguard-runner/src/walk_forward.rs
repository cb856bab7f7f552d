//! Walk-forward validation: rolling in-sample / out-of-sample windows.
//!
//! The window start advances by the out-of-sample length each iteration, so
//! successive OOS spans never overlap:
//! - Window k: IS = [k*oos .. k*oos + is], OOS = [k*oos + is .. k*oos + is + oos]
//!
//! The same fixed strategy runs on both spans of every window. Per window the
//! engine measures return degradation from IS to OOS and flags overfitting;
//! across windows it compounds OOS returns and emits a PASS/WARNING/FAIL
//! verdict with a reason.
//!
//! The OOS "Sharpe" is mean / population-stdev of the per-window OOS returns,
//! scaled by sqrt(window count). It is a small-sample statistic over a handful
//! of windows, not a daily-return Sharpe, and should be read as such.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use trendguard_core::domain::Candle;

use crate::backtest::{run_backtest, BacktestResult, BacktestSettings, BacktestStrategy};
use crate::metrics::{mean_f64, population_std_dev};

/// Degradation above this marks a window as overfit.
pub const OVERFIT_DEGRADATION_PCT: f64 = 70.0;
/// IS return above this with a losing OOS span marks a window as overfit.
pub const OVERFIT_IS_RETURN_PCT: f64 = 50.0;
/// Average degradation above this fails the run.
pub const FAIL_AVG_DEGRADATION_PCT: f64 = 50.0;
/// Average degradation above this downgrades a run to WARNING.
pub const WARN_AVG_DEGRADATION_PCT: f64 = 30.0;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// In-sample span length in candles.
    pub in_sample_period: usize,
    /// Out-of-sample span length in candles. Also the window step.
    pub out_of_sample_period: usize,
    pub initial_balance: f64,
    /// Fewer total OOS trades than this yields WARNING.
    pub min_trades: usize,
    /// An OOS Sharpe above this is treated as too good to be true.
    pub max_sharpe_threshold: f64,
    /// Keep a trailing window whose OOS span is clipped by the end of data,
    /// provided it holds at least half the target length. Off by default, so
    /// N candles give exactly `floor((N - IS - OOS) / OOS) + 1` full windows.
    pub allow_partial_final_window: bool,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            in_sample_period: 500,
            out_of_sample_period: 200,
            initial_balance: 10_000.0,
            min_trades: 30,
            max_sharpe_threshold: 3.0,
            allow_partial_final_window: false,
        }
    }
}

impl WalkForwardConfig {
    pub fn validate(&self) -> Result<(), WalkForwardError> {
        if self.in_sample_period == 0 {
            return Err(WalkForwardError::ZeroLengthSpan("in_sample_period"));
        }
        if self.out_of_sample_period == 0 {
            return Err(WalkForwardError::ZeroLengthSpan("out_of_sample_period"));
        }
        if self.initial_balance.is_nan() || self.initial_balance <= 0.0 {
            return Err(WalkForwardError::InvalidBalance(self.initial_balance));
        }
        Ok(())
    }
}

/// Errors from walk-forward validation. Only invalid configuration is an
/// error; too little data yields a FAIL verdict instead.
#[derive(Debug, Error, PartialEq)]
pub enum WalkForwardError {
    #[error("{0} must be at least 1 candle")]
    ZeroLengthSpan(&'static str),
    #[error("initial balance must be positive, got {0}")]
    InvalidBalance(f64),
}

// ─── Result types ────────────────────────────────────────────────────

/// Candle index ranges of one window. Ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub index: usize,
    pub is_start: usize,
    pub is_end: usize,
    pub oos_start: usize,
    pub oos_end: usize,
}

impl WindowSpec {
    pub fn oos_len(&self) -> usize {
        self.oos_end - self.oos_start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    pub spec: WindowSpec,
    pub in_sample: BacktestResult,
    pub out_of_sample: BacktestResult,
    pub degradation_pct: f64,
    pub is_overfit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardSummary {
    pub window_count: usize,
    /// OOS returns compounded across windows, in percent.
    pub compounded_oos_return_pct: f64,
    pub avg_is_return_pct: f64,
    pub avg_oos_return_pct: f64,
    pub total_oos_trades: usize,
    pub total_oos_wins: usize,
    pub total_oos_losses: usize,
    /// Worst per-window OOS drawdown, in percent.
    pub max_oos_drawdown_pct: f64,
    pub avg_degradation_pct: f64,
    pub oos_sharpe: f64,
    pub overfit_windows: usize,
    pub overfit_reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Warning,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Warning => write!(f, "WARNING"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub symbol: String,
    pub config: WalkForwardConfig,
    pub windows: Vec<WalkForwardWindow>,
    pub summary: WalkForwardSummary,
    pub verdict: Verdict,
    pub verdict_reason: String,
}

// ─── Window creation ─────────────────────────────────────────────────

/// Create rolling window specifications over `total` candles.
///
/// Only windows whose OOS span fits entirely are produced, unless
/// `allow_partial_final_window` is set, in which case one trailing clipped
/// window with at least half the OOS target is kept. With IS = 100 and
/// OOS = 50 this yields `floor((N - 150) / 50) + 1` windows for N >= 150.
pub fn create_windows(total: usize, config: &WalkForwardConfig) -> Vec<WindowSpec> {
    let is_len = config.in_sample_period;
    let oos_len = config.out_of_sample_period;
    let mut windows = Vec::new();
    if is_len == 0 || oos_len == 0 {
        return windows;
    }

    let mut start = 0;
    while start + is_len < total {
        let oos_start = start + is_len;
        let oos_end = (oos_start + oos_len).min(total);
        let spec = WindowSpec {
            index: windows.len(),
            is_start: start,
            is_end: oos_start,
            oos_start,
            oos_end,
        };

        if spec.oos_len() == oos_len {
            windows.push(spec);
        } else {
            if config.allow_partial_final_window && spec.oos_len() * 2 >= oos_len {
                windows.push(spec);
            }
            break;
        }
        start += oos_len;
    }

    windows
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Run walk-forward validation of `strategy` over `candles`.
///
/// Windows are evaluated in parallel; output order matches window order.
pub fn run_walk_forward<S>(
    candles: &[Candle],
    strategy: &S,
    symbol: &str,
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult, WalkForwardError>
where
    S: BacktestStrategy + Sync + ?Sized,
{
    config.validate()?;
    let specs = create_windows(candles.len(), config);
    let settings = BacktestSettings {
        initial_balance: config.initial_balance,
    };

    let windows: Vec<WalkForwardWindow> = specs
        .par_iter()
        .map(|spec| evaluate_window(candles, strategy, symbol, spec, &settings))
        .collect();

    let summary = summarize(&windows, config);
    let (verdict, verdict_reason) = if windows.is_empty() {
        (
            Verdict::Fail,
            format!(
                "insufficient data: {} candles cannot fill one {}+{} window",
                candles.len(),
                config.in_sample_period,
                config.out_of_sample_period
            ),
        )
    } else {
        decide_verdict(&summary, config)
    };

    info!(
        symbol,
        windows = summary.window_count,
        compounded_oos_return_pct = summary.compounded_oos_return_pct,
        avg_degradation_pct = summary.avg_degradation_pct,
        oos_sharpe = summary.oos_sharpe,
        verdict = %verdict,
        "walk-forward complete: {verdict_reason}"
    );

    Ok(WalkForwardResult {
        symbol: symbol.to_string(),
        config: config.clone(),
        windows,
        summary,
        verdict,
        verdict_reason,
    })
}

fn evaluate_window<S>(
    candles: &[Candle],
    strategy: &S,
    symbol: &str,
    spec: &WindowSpec,
    settings: &BacktestSettings,
) -> WalkForwardWindow
where
    S: BacktestStrategy + ?Sized,
{
    let is_label = format!("window-{}-is", spec.index);
    let oos_label = format!("window-{}-oos", spec.index);
    let in_sample = run_backtest(
        &candles[spec.is_start..spec.is_end],
        strategy,
        symbol,
        &is_label,
        settings,
    );
    let out_of_sample = run_backtest(
        &candles[spec.oos_start..spec.oos_end],
        strategy,
        symbol,
        &oos_label,
        settings,
    );

    let is_return = in_sample.total_return_pct();
    let oos_return = out_of_sample.total_return_pct();
    let degradation_pct = degradation(is_return, oos_return);
    let is_overfit = is_window_overfit(degradation_pct, is_return, oos_return);

    debug!(
        window = spec.index,
        is_return_pct = is_return,
        oos_return_pct = oos_return,
        degradation_pct,
        is_overfit,
        "walk-forward window evaluated"
    );

    WalkForwardWindow {
        spec: *spec,
        in_sample,
        out_of_sample,
        degradation_pct,
        is_overfit,
    }
}

/// (IS − OOS) / |IS| × 100, or 0 when the IS return is exactly 0.
pub fn degradation(is_return_pct: f64, oos_return_pct: f64) -> f64 {
    if is_return_pct == 0.0 {
        return 0.0;
    }
    (is_return_pct - oos_return_pct) / is_return_pct.abs() * 100.0
}

pub fn is_window_overfit(degradation_pct: f64, is_return_pct: f64, oos_return_pct: f64) -> bool {
    degradation_pct > OVERFIT_DEGRADATION_PCT
        || (is_return_pct > OVERFIT_IS_RETURN_PCT && oos_return_pct < 0.0)
}

/// Aggregate per-window results.
pub fn summarize(windows: &[WalkForwardWindow], config: &WalkForwardConfig) -> WalkForwardSummary {
    let is_returns: Vec<f64> = windows.iter().map(|w| w.in_sample.total_return_pct()).collect();
    let oos_returns: Vec<f64> = windows
        .iter()
        .map(|w| w.out_of_sample.total_return_pct())
        .collect();
    let degradations: Vec<f64> = windows.iter().map(|w| w.degradation_pct).collect();

    let compounded = oos_returns
        .iter()
        .fold(1.0, |acc, r| acc * (1.0 + r / 100.0));
    let avg_degradation_pct = mean_f64(&degradations);
    let oos_sharpe = window_sharpe(&oos_returns);
    let overfit_windows = windows.iter().filter(|w| w.is_overfit).count();

    let mut overfit_reasons = Vec::new();
    if overfit_windows * 2 > windows.len() {
        overfit_reasons.push(format!(
            "{overfit_windows} of {} windows flagged as overfit",
            windows.len()
        ));
    }
    if avg_degradation_pct > FAIL_AVG_DEGRADATION_PCT {
        overfit_reasons.push(format!(
            "average degradation {avg_degradation_pct:.1}% exceeds {FAIL_AVG_DEGRADATION_PCT}%"
        ));
    }
    if oos_sharpe > config.max_sharpe_threshold {
        overfit_reasons.push(format!(
            "out-of-sample Sharpe {oos_sharpe:.2} exceeds {:.2} (too good to be true)",
            config.max_sharpe_threshold
        ));
    }

    WalkForwardSummary {
        window_count: windows.len(),
        compounded_oos_return_pct: (compounded - 1.0) * 100.0,
        avg_is_return_pct: mean_f64(&is_returns),
        avg_oos_return_pct: mean_f64(&oos_returns),
        total_oos_trades: windows.iter().map(|w| w.out_of_sample.trade_count()).sum(),
        total_oos_wins: windows.iter().map(|w| w.out_of_sample.wins).sum(),
        total_oos_losses: windows.iter().map(|w| w.out_of_sample.losses).sum(),
        max_oos_drawdown_pct: windows
            .iter()
            .map(|w| w.out_of_sample.max_drawdown_pct)
            .fold(0.0, f64::max),
        avg_degradation_pct,
        oos_sharpe,
        overfit_windows,
        overfit_reasons,
    }
}

/// mean / population stdev of per-window returns, scaled by sqrt(count).
/// 0 when there is no dispersion.
pub fn window_sharpe(returns: &[f64]) -> f64 {
    let std = population_std_dev(returns);
    if std == 0.0 {
        return 0.0;
    }
    mean_f64(returns) / std * (returns.len() as f64).sqrt()
}

/// Verdict rules, first match wins.
pub fn decide_verdict(summary: &WalkForwardSummary, config: &WalkForwardConfig) -> (Verdict, String) {
    if !summary.overfit_reasons.is_empty() {
        return (
            Verdict::Fail,
            format!("overfitting detected: {}", summary.overfit_reasons.join("; ")),
        );
    }
    if summary.total_oos_trades < config.min_trades {
        return (
            Verdict::Warning,
            format!(
                "statistically insufficient: {} out-of-sample trades, need {}",
                summary.total_oos_trades, config.min_trades
            ),
        );
    }
    if summary.compounded_oos_return_pct < 0.0 {
        return (
            Verdict::Fail,
            format!(
                "negative compounded out-of-sample return {:.2}%",
                summary.compounded_oos_return_pct
            ),
        );
    }
    if summary.avg_degradation_pct > WARN_AVG_DEGRADATION_PCT {
        return (
            Verdict::Warning,
            format!(
                "average degradation {:.1}% above {WARN_AVG_DEGRADATION_PCT}%",
                summary.avg_degradation_pct
            ),
        );
    }
    (
        Verdict::Pass,
        format!(
            "{} windows, compounded out-of-sample return {:.2}%, average degradation {:.1}%",
            summary.window_count, summary.compounded_oos_return_pct, summary.avg_degradation_pct
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(is_len: usize, oos_len: usize) -> WalkForwardConfig {
        WalkForwardConfig {
            in_sample_period: is_len,
            out_of_sample_period: oos_len,
            ..Default::default()
        }
    }

    fn summary() -> WalkForwardSummary {
        WalkForwardSummary {
            window_count: 4,
            compounded_oos_return_pct: 12.0,
            avg_is_return_pct: 5.0,
            avg_oos_return_pct: 3.0,
            total_oos_trades: 40,
            total_oos_wins: 12,
            total_oos_losses: 8,
            max_oos_drawdown_pct: 6.0,
            avg_degradation_pct: 10.0,
            oos_sharpe: 1.2,
            overfit_windows: 0,
            overfit_reasons: Vec::new(),
        }
    }

    // ─── Window creation ─────────────────────────────────────────

    #[test]
    fn window_count_matches_formula() {
        let cfg = config(100, 50);
        for n in 150..600 {
            let expected = (n - 150) / 50 + 1;
            assert_eq!(create_windows(n, &cfg).len(), expected, "N = {n}");
        }
    }

    #[test]
    fn too_little_data_yields_no_windows() {
        assert!(create_windows(149, &config(100, 50)).is_empty());
        assert!(create_windows(0, &config(100, 50)).is_empty());
    }

    #[test]
    fn oos_spans_are_contiguous_and_follow_is() {
        let windows = create_windows(400, &config(100, 50));
        for w in &windows {
            assert_eq!(w.is_end, w.oos_start);
            assert_eq!(w.is_end - w.is_start, 100);
        }
        for pair in windows.windows(2) {
            assert_eq!(pair[1].oos_start, pair[0].oos_end);
            assert_eq!(pair[1].is_start, pair[0].is_start + 50);
        }
    }

    #[test]
    fn partial_final_window_kept_when_allowed() {
        let mut cfg = config(100, 50);
        cfg.allow_partial_final_window = true;

        // 180 candles: second window OOS would be [150, 180) = 30 >= 25
        let windows = create_windows(180, &cfg);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].oos_len(), 30);

        // 170 candles: clipped OOS of 20 is under half the target
        assert_eq!(create_windows(170, &cfg).len(), 1);
    }

    #[test]
    fn default_config_keeps_full_windows_only() {
        let mut cfg = WalkForwardConfig::default();
        assert!(!cfg.allow_partial_final_window);
        // (1000 - 700) / 200 + 1; the clipped [900, 1000) tail is dropped
        assert_eq!(create_windows(1000, &cfg).len(), 2);

        cfg.allow_partial_final_window = true;
        assert_eq!(create_windows(1000, &cfg).len(), 3);
    }

    #[test]
    fn zero_length_span_is_rejected() {
        let cfg = config(0, 50);
        assert_eq!(
            cfg.validate(),
            Err(WalkForwardError::ZeroLengthSpan("in_sample_period"))
        );
        let strategy = |_: &[Candle], _: f64| crate::backtest::TradeAction::Hold;
        assert!(run_walk_forward(&[], &strategy, "X", &config(100, 0)).is_err());
    }

    // ─── Degradation and overfit ─────────────────────────────────

    #[test]
    fn degradation_known_values() {
        assert!((degradation(20.0, 5.0) - 75.0).abs() < 1e-12);
        assert!((degradation(-10.0, -5.0) - (-50.0)).abs() < 1e-12);
        assert_eq!(degradation(0.0, -30.0), 0.0);
    }

    #[test]
    fn overfit_rules() {
        assert!(is_window_overfit(75.0, 20.0, 5.0));
        assert!(!is_window_overfit(70.0, 20.0, 6.0));
        // Big IS win, OOS loss: overfit even if degradation looks modest
        assert!(is_window_overfit(60.0, 60.0, -1.0));
        assert!(!is_window_overfit(60.0, 50.0, -1.0));
    }

    #[test]
    fn window_sharpe_uses_population_std() {
        // mean 2, population std 1, sqrt(2)
        let s = window_sharpe(&[1.0, 3.0]);
        assert!((s - 2.0 * 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(window_sharpe(&[5.0, 5.0, 5.0]), 0.0);
        assert_eq!(window_sharpe(&[]), 0.0);
    }

    // ─── Verdict ─────────────────────────────────────────────────

    #[test]
    fn verdict_pass() {
        let (v, _) = decide_verdict(&summary(), &WalkForwardConfig::default());
        assert_eq!(v, Verdict::Pass);
    }

    #[test]
    fn overfit_beats_every_other_rule() {
        let mut s = summary();
        s.overfit_reasons.push("x".into());
        s.total_oos_trades = 0;
        s.compounded_oos_return_pct = -50.0;
        let (v, reason) = decide_verdict(&s, &WalkForwardConfig::default());
        assert_eq!(v, Verdict::Fail);
        assert!(reason.contains("overfitting"));
    }

    #[test]
    fn too_few_trades_warns_before_negative_return() {
        let mut s = summary();
        s.total_oos_trades = 10;
        s.compounded_oos_return_pct = -5.0;
        let (v, _) = decide_verdict(&s, &WalkForwardConfig::default());
        assert_eq!(v, Verdict::Warning);
    }

    #[test]
    fn negative_compounded_return_fails() {
        let mut s = summary();
        s.compounded_oos_return_pct = -0.5;
        let (v, _) = decide_verdict(&s, &WalkForwardConfig::default());
        assert_eq!(v, Verdict::Fail);
    }

    #[test]
    fn moderate_degradation_warns() {
        let mut s = summary();
        s.avg_degradation_pct = 35.0;
        let (v, _) = decide_verdict(&s, &WalkForwardConfig::default());
        assert_eq!(v, Verdict::Warning);
    }

    #[test]
    fn no_windows_is_fail_with_reason() {
        let strategy = |_: &[Candle], _: f64| crate::backtest::TradeAction::Hold;
        let result = run_walk_forward(&[], &strategy, "X", &config(100, 50)).unwrap();
        assert_eq!(result.verdict, Verdict::Fail);
        assert!(result.verdict_reason.contains("insufficient data"));
        assert_eq!(result.summary.window_count, 0);
    }
}
