//! Position sizing formulas.
//!
//! Two methods: fractional Kelly once enough closed trades exist, and
//! stop-distance sizing before that. Both return a quantity in base units
//! and never a negative value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingMethod {
    Kelly,
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sizing {
    pub method: SizingMethod,
    /// Fraction of equity put at risk.
    pub risk_pct: f64,
    pub risk_amount: f64,
    pub quantity: f64,
}

impl Sizing {
    pub fn zero(method: SizingMethod) -> Self {
        Self {
            method,
            risk_pct: 0.0,
            risk_amount: 0.0,
            quantity: 0.0,
        }
    }
}

/// Raw Kelly percentage: (p·W − (1−p)·L) / W. Zero when `avg_win <= 0`.
///
/// `avg_loss` is a magnitude. The result may be negative for a losing edge.
pub fn kelly_pct(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    if avg_win <= 0.0 {
        return 0.0;
    }
    (win_rate * avg_win - (1.0 - win_rate) * avg_loss) / avg_win
}

/// Fractional Kelly sizing.
///
/// `risk_multiplier` is 1.0 normally and the weekly reduction factor while the
/// weekly drawdown limit is breached.
#[allow(clippy::too_many_arguments)]
pub fn kelly_size(
    equity: f64,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    kelly_fraction: f64,
    max_risk_per_trade: f64,
    risk_multiplier: f64,
    price: f64,
    leverage: f64,
) -> Sizing {
    if price <= 0.0 || equity <= 0.0 {
        return Sizing::zero(SizingMethod::Kelly);
    }
    let risk_pct =
        (kelly_pct(win_rate, avg_win, avg_loss) * kelly_fraction).clamp(0.0, max_risk_per_trade)
            * risk_multiplier;
    let risk_amount = equity * risk_pct;
    Sizing {
        method: SizingMethod::Kelly,
        risk_pct,
        risk_amount,
        quantity: risk_amount * leverage / price,
    }
}

/// Stop-distance sizing: hitting `stop_price` loses exactly the risk budget.
///
/// The budget is `max_risk_per_trade · risk_multiplier` of equity. Position
/// notional is `risk_amount / (|price − stop| / price)`; leverage scales PnL,
/// so the quantity is divided by it. A zero stop distance sizes to nothing.
pub fn simple_size(
    equity: f64,
    max_risk_per_trade: f64,
    risk_multiplier: f64,
    price: f64,
    stop_price: f64,
    leverage: f64,
) -> Sizing {
    let stop_distance = (price - stop_price).abs();
    if price <= 0.0 || equity <= 0.0 || stop_distance <= 0.0 || leverage <= 0.0 {
        return Sizing::zero(SizingMethod::Simple);
    }
    let risk_pct = max_risk_per_trade * risk_multiplier;
    let risk_amount = equity * risk_pct;
    let notional = risk_amount / (stop_distance / price);
    Sizing {
        method: SizingMethod::Simple,
        risk_pct,
        risk_amount,
        quantity: notional / price / leverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn kelly_formula() {
        // 0.6·2 − 0.4·1 = 0.8, / 2 = 0.4
        assert_approx(kelly_pct(0.6, 2.0, 1.0), 0.4);
    }

    #[test]
    fn kelly_zero_without_wins() {
        assert_eq!(kelly_pct(0.5, 0.0, 1.0), 0.0);
        let sizing = kelly_size(1000.0, 0.0, 0.0, 5.0, 0.25, 0.02, 1.0, 100.0, 3.0);
        assert_eq!(sizing.quantity, 0.0);
    }

    #[test]
    fn kelly_zero_win_rate_yields_zero_quantity() {
        let sizing = kelly_size(1000.0, 0.0, 10.0, 5.0, 0.25, 0.02, 1.0, 100.0, 3.0);
        assert_eq!(sizing.risk_pct, 0.0);
        assert_eq!(sizing.quantity, 0.0);
    }

    #[test]
    fn kelly_clamped_to_max_risk() {
        // kelly 0.4 · 0.25 = 0.1, clamped to 0.02
        let sizing = kelly_size(1000.0, 0.6, 2.0, 1.0, 0.25, 0.02, 1.0, 50.0, 2.0);
        assert_approx(sizing.risk_pct, 0.02);
        assert_approx(sizing.risk_amount, 20.0);
        assert_approx(sizing.quantity, 0.8);
    }

    #[test]
    fn kelly_reduced_under_weekly_breach() {
        let sizing = kelly_size(1000.0, 0.6, 2.0, 1.0, 0.25, 0.02, 0.5, 50.0, 2.0);
        assert_approx(sizing.risk_pct, 0.01);
        assert_approx(sizing.quantity, 0.4);
    }

    #[test]
    fn simple_size_loses_budget_at_stop() {
        let sizing = simple_size(1000.0, 0.02, 1.0, 100.0, 95.0, 1.0);
        assert_approx(sizing.risk_amount, 20.0);
        assert_approx(sizing.quantity, 4.0);
        assert_approx(sizing.quantity * (100.0 - 95.0), 20.0);
    }

    #[test]
    fn simple_size_accounts_for_leverage() {
        let sizing = simple_size(1000.0, 0.02, 1.0, 100.0, 95.0, 4.0);
        assert_approx(sizing.quantity, 1.0);
        assert_approx(sizing.quantity * 5.0 * 4.0, 20.0);
    }

    #[test]
    fn simple_size_zero_stop_distance() {
        assert_eq!(simple_size(1000.0, 0.02, 1.0, 100.0, 100.0, 1.0).quantity, 0.0);
    }
}
