//! Performance metrics: pure functions over an equity curve.
//!
//! Every metric takes a slice of equity samples and returns a scalar. The
//! backtester, the walk-forward engine and the live risk manager all share
//! these definitions.

// ─── Curve metrics ──────────────────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&final_eq)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (final_eq - initial) / initial
        }
        _ => 0.0,
    }
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Drawdown of `current` from `peak` as a fraction; never positive.
pub fn drawdown(current: f64, peak: f64) -> f64 {
    if peak <= 0.0 {
        return 0.0;
    }
    ((current - peak) / peak).min(0.0)
}

/// Sharpe ratio over per-sample returns of an equity curve.
///
/// mean(returns) / std(returns) * sqrt(periods_per_year), using the sample
/// standard deviation. Returns 0.0 for fewer than 2 returns or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64], periods_per_year: f64) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * periods_per_year.sqrt()
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity samples.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1).
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Population standard deviation (n).
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Total return ──

    #[test]
    fn total_return_positive() {
        let eq = vec![100_000.0, 100_500.0, 101_000.0, 110_000.0];
        assert!((total_return(&eq) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn total_return_negative() {
        let eq = vec![100_000.0, 95_000.0, 90_000.0];
        assert!((total_return(&eq) - (-0.1)).abs() < 1e-10);
    }

    #[test]
    fn total_return_single_sample() {
        assert_eq!(total_return(&[100_000.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    // ── Drawdown ──

    #[test]
    fn max_drawdown_known_curve() {
        // Peak 120, trough 90 → -25%
        let eq = vec![100.0, 120.0, 110.0, 90.0, 130.0, 125.0];
        assert!((max_drawdown(&eq) - (-0.25)).abs() < 1e-12);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        let eq: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        assert_eq!(max_drawdown(&eq), 0.0);
    }

    #[test]
    fn drawdown_never_positive() {
        assert_eq!(drawdown(1100.0, 1000.0), 0.0);
        assert!((drawdown(900.0, 1000.0) - (-0.1)).abs() < 1e-12);
        assert_eq!(drawdown(500.0, 0.0), 0.0);
    }

    // ── Sharpe ──

    #[test]
    fn sharpe_constant_equity_is_zero() {
        let eq = vec![100_000.0; 100];
        assert_eq!(sharpe_ratio(&eq, 365.0), 0.0);
    }

    #[test]
    fn sharpe_consistently_positive_is_high() {
        let mut eq = vec![100_000.0];
        for i in 1..253 {
            let r = if i % 2 == 0 { 1.002 } else { 1.0005 };
            eq.push(eq[i - 1] * r);
        }
        let s = sharpe_ratio(&eq, 252.0);
        assert!(s > 5.0, "Sharpe should be high, got {s}");
    }

    #[test]
    fn sharpe_too_few_samples() {
        assert_eq!(sharpe_ratio(&[100.0, 110.0], 365.0), 0.0);
    }

    // ── Helpers ──

    #[test]
    fn sample_and_population_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&v) - 2.0).abs() < 1e-12);
        assert!((std_dev(&v) - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn period_returns_known() {
        let r = period_returns(&[100.0, 110.0, 99.0]);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] - (-0.1)).abs() < 1e-12);
    }
}
