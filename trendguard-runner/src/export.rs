//! Result export: JSON and CSV artifacts for external analysis.
//!
//! JSON round-trips through `import_json`, which rejects schema versions
//! newer than this build understands.

use anyhow::{bail, Context, Result};

use crate::backtest::{BacktestResult, TradeRecord, SCHEMA_VERSION};
use crate::walk_forward::WalkForwardResult;

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

pub fn export_walk_forward_json(result: &WalkForwardResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize WalkForwardResult to JSON")
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Columns: index, timestamp, action, price, quantity, value
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "timestamp", "action", "price", "quantity", "value"])?;
    for t in trades {
        wtr.write_record([
            t.index.to_string(),
            t.timestamp.to_rfc3339(),
            format!("{:?}", t.action).to_uppercase(),
            format!("{:.6}", t.price),
            format!("{:.8}", t.quantity),
            format!("{:.2}", t.value),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(equity_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["index", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([i.to_string(), format!("{eq:.2}")])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
