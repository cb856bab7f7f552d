//! TrendGuard CLI: signal, backtest, walk-forward and paper-trading commands.
//!
//! Commands:
//! - `signal` — latest trend signal for a CSV or synthetic candle series
//! - `backtest` — single backtest of the trend-following strategy
//! - `walk-forward` — rolling IS/OOS validation; exits with status 2 on FAIL
//! - `paper` — the live loop against the replay paper exchange

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trendguard_core::data::synthetic_candles;
use trendguard_core::{Candle, TrendSignal, TrendSignalGenerator};
use trendguard_live::{LiveRunner, LogNotifier, PaperExchange, RiskManager, RiskSnapshot, SystemClock};
use trendguard_runner::export::{
    export_equity_csv, export_json, export_trades_csv, export_walk_forward_json,
};
use trendguard_runner::{
    load_candles_csv, run_backtest, run_walk_forward, BacktestResult, TrendFollowingStrategy,
    Verdict, WalkForwardResult,
};

use crate::config::TrendguardConfig;

/// Paper replays one candle per tick at this pace unless overridden.
const PAPER_TICK_MS: u64 = 10;

#[derive(Parser)]
#[command(
    name = "trendguard",
    about = "TrendGuard: trend signals, walk-forward validation and risk-managed paper trading"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./trendguard.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Candle CSV (timestamp,open,high,low,close,volume). Synthetic data if omitted.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Symbol label, also the seed key for synthetic data.
    #[arg(long, default_value = "BTCUSDT")]
    symbol: String,

    /// Synthetic series length.
    #[arg(long, default_value_t = 1000)]
    candles: usize,

    /// Synthetic series seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl DataArgs {
    fn load(&self) -> Result<Vec<Candle>> {
        match &self.csv {
            Some(path) => load_candles_csv(path)
                .with_context(|| format!("loading candles from {}", path.display())),
            None => {
                info!(symbol = %self.symbol, candles = self.candles, seed = self.seed, "using synthetic candles");
                Ok(synthetic_candles(&self.symbol, self.candles, self.seed))
            }
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the latest trend signal.
    Signal {
        #[command(flatten)]
        data: DataArgs,

        /// Print JSON instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Backtest the trend-following strategy over the whole series.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// Starting balance (overrides the config file).
        #[arg(long)]
        balance: Option<f64>,

        /// Write the trade ledger as CSV.
        #[arg(long)]
        trades_csv: Option<PathBuf>,

        /// Write the equity curve as CSV.
        #[arg(long)]
        equity_csv: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Walk-forward validation. Exits with status 2 on a FAIL verdict.
    WalkForward {
        #[command(flatten)]
        data: DataArgs,

        /// In-sample span in candles (overrides the config file).
        #[arg(long)]
        in_sample: Option<usize>,

        /// Out-of-sample span in candles (overrides the config file).
        #[arg(long)]
        out_of_sample: Option<usize>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run the live loop against the replay paper exchange.
    Paper {
        /// Symbols to trade (overrides the config file).
        #[arg(long, num_args = 1..)]
        symbols: Vec<String>,

        /// Number of scans. Defaults to the remaining replay length.
        #[arg(long)]
        ticks: Option<u64>,

        /// Milliseconds between scans.
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Starting equity (overrides the config file).
        #[arg(long)]
        balance: Option<f64>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = TrendguardConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Signal { data, json } => run_signal(&config, &data, json),
        Commands::Backtest {
            data,
            balance,
            trades_csv,
            equity_csv,
            json,
        } => run_backtest_cmd(config, &data, balance, trades_csv, equity_csv, json),
        Commands::WalkForward {
            data,
            in_sample,
            out_of_sample,
            json,
        } => {
            let result = run_walk_forward_cmd(config, &data, in_sample, out_of_sample)?;
            if json {
                println!("{}", export_walk_forward_json(&result)?);
            } else {
                print_walk_forward(&result);
            }
            if result.verdict == Verdict::Fail {
                std::process::exit(2);
            }
            Ok(())
        }
        Commands::Paper {
            symbols,
            ticks,
            interval_ms,
            balance,
            json,
        } => run_paper(config, symbols, ticks, interval_ms, balance, json),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

// ─── signal ─────────────────────────────────────────────────────────

fn run_signal(config: &TrendguardConfig, data: &DataArgs, json: bool) -> Result<()> {
    let candles = data.load()?;
    let generator = TrendSignalGenerator::new(config.signal.clone());
    let signal = generator.generate(&candles);
    if json {
        println!("{}", serde_json::to_string_pretty(&signal)?);
    } else {
        print_signal(&data.symbol, candles.last(), &signal);
    }
    Ok(())
}

fn print_signal(symbol: &str, last: Option<&Candle>, signal: &TrendSignal) {
    println!();
    println!("=== Trend Signal ===");
    println!("Symbol:      {symbol}");
    if let Some(candle) = last {
        println!("As of:       {}", candle.timestamp);
        println!("Price:       {:.4}", candle.close);
    }
    println!("Action:      {}", signal.action);
    println!("Regime:      {}", signal.regime);
    println!("ADX:         {:.2}", signal.adx_value);
    println!("Confidence:  {:.0}", signal.confidence);
    if let Some(stop) = signal.stop_loss {
        println!("Stop loss:   {stop:.4}");
    }
    if let Some(target) = signal.take_profit {
        println!("Take profit: {target:.4}");
    }
    println!("Reason:      {}", signal.reason);
    println!();
}

// ─── backtest ───────────────────────────────────────────────────────

fn run_backtest_cmd(
    mut config: TrendguardConfig,
    data: &DataArgs,
    balance: Option<f64>,
    trades_csv: Option<PathBuf>,
    equity_csv: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if let Some(balance) = balance {
        config.backtest.initial_balance = balance;
        config.validate()?;
    }
    let candles = data.load()?;
    let strategy = TrendFollowingStrategy::new(config.signal.clone());
    let result = run_backtest(&candles, &strategy, &data.symbol, "trend", &config.backtest);

    if let Some(path) = trades_csv {
        std::fs::write(&path, export_trades_csv(&result.trades)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = equity_csv {
        std::fs::write(&path, export_equity_csv(&result.equity_curve)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if json {
        println!("{}", export_json(&result)?);
    } else {
        print_backtest(&result);
    }
    Ok(())
}

fn print_backtest(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:          {}", result.symbol);
    if let (Some(start), Some(end)) = (result.period.start, result.period.end) {
        println!("Period:          {start} to {end}");
    }
    println!("Candles:         {}", result.period.candles);
    println!("Trades:          {}", result.trade_count());
    println!();
    println!("--- Performance ---");
    println!("Initial balance: {:.2}", result.initial_balance);
    println!("Final balance:   {:.2}", result.final_balance);
    println!("Total return:    {:.2}%", result.total_return_pct());
    println!("Max drawdown:    {:.2}%", result.max_drawdown_pct);
    println!(
        "Win rate:        {}",
        win_rate_line(result.win_rate(), result.wins, result.losses)
    );
    println!("Fingerprint:     {}", result.fingerprint());
    println!();
}

/// `win_rate` is a fraction in [0, 1].
fn win_rate_line(win_rate: f64, wins: usize, losses: usize) -> String {
    format!("{:.1}% ({wins} W / {losses} L)", win_rate * 100.0)
}

// ─── walk-forward ───────────────────────────────────────────────────

fn run_walk_forward_cmd(
    mut config: TrendguardConfig,
    data: &DataArgs,
    in_sample: Option<usize>,
    out_of_sample: Option<usize>,
) -> Result<WalkForwardResult> {
    if let Some(is) = in_sample {
        config.walk_forward.in_sample_period = is;
    }
    if let Some(oos) = out_of_sample {
        config.walk_forward.out_of_sample_period = oos;
    }
    config.validate()?;

    let candles = data.load()?;
    let strategy = TrendFollowingStrategy::new(config.signal.clone());
    let result = run_walk_forward(&candles, &strategy, &data.symbol, &config.walk_forward)?;
    Ok(result)
}

fn print_walk_forward(result: &WalkForwardResult) {
    let s = &result.summary;
    println!();
    println!("=== Walk-Forward: {} ===", result.symbol);
    println!(
        "Windows:          {} (IS {} / OOS {})",
        s.window_count, result.config.in_sample_period, result.config.out_of_sample_period
    );
    println!();
    println!(
        "{:<4} {:>10} {:>10} {:>12} {:>8}",
        "#", "IS %", "OOS %", "Degradation", "Overfit"
    );
    println!("{}", "-".repeat(48));
    for w in &result.windows {
        println!(
            "{:<4} {:>10.2} {:>10.2} {:>11.1}% {:>8}",
            w.spec.index,
            w.in_sample.total_return_pct(),
            w.out_of_sample.total_return_pct(),
            w.degradation_pct,
            if w.is_overfit { "yes" } else { "" }
        );
    }
    println!();
    println!("Compounded OOS:   {:.2}%", s.compounded_oos_return_pct);
    println!("Avg IS / OOS:     {:.2}% / {:.2}%", s.avg_is_return_pct, s.avg_oos_return_pct);
    println!("Avg degradation:  {:.1}%", s.avg_degradation_pct);
    println!("OOS Sharpe:       {:.3}", s.oos_sharpe);
    println!("OOS trades:       {}", s.total_oos_trades);
    println!("Max OOS drawdown: {:.2}%", s.max_oos_drawdown_pct);
    println!();
    println!("Verdict: {} ({})", result.verdict, result.verdict_reason);
    println!();
}

// ─── paper ──────────────────────────────────────────────────────────

fn run_paper(
    mut config: TrendguardConfig,
    symbols: Vec<String>,
    ticks: Option<u64>,
    interval_ms: Option<u64>,
    balance: Option<f64>,
    json: bool,
) -> Result<()> {
    if !symbols.is_empty() {
        config.scan.symbols = symbols;
    }
    if let Some(balance) = balance {
        config.paper.starting_equity = balance;
    }
    config.validate()?;

    let paper = &config.paper;
    let start_index = paper.warmup_candles.saturating_sub(1);
    let mut exchange = PaperExchange::new(paper.starting_equity, start_index);
    for symbol in &config.scan.symbols {
        let candles = synthetic_candles(symbol, paper.synthetic_candles, paper.seed);
        exchange = exchange
            .with_series(symbol, candles)
            .with_context(|| format!("loading paper series for {symbol}"))?;
    }

    let mut scan = config.scan.clone();
    scan.scan_interval_ms = interval_ms.unwrap_or(PAPER_TICK_MS).max(1);
    scan.max_ticks = ticks
        .or(scan.max_ticks)
        .or(Some(paper.synthetic_candles.saturating_sub(start_index) as u64));

    let manager = RiskManager::new(config.risk.clone(), paper.starting_equity, Arc::new(SystemClock))
        .context("building risk manager")?;
    let runner = LiveRunner::new(
        Arc::new(exchange),
        TrendSignalGenerator::new(config.signal.clone()),
        scan,
    );

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let report = runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("ctrl-c received; finishing current scan");
                let _ = shutdown_tx.send(true);
            }
        });
        runner.run(manager, Arc::new(LogNotifier), shutdown_rx).await
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.snapshot)?);
    } else {
        print_snapshot(report.ticks, &report.snapshot);
    }
    Ok(())
}

fn print_snapshot(ticks: u64, s: &RiskSnapshot) {
    println!();
    println!("=== Paper Run ({ticks} scans) ===");
    println!("Starting equity:  {:.2}", s.starting_equity);
    println!("Current equity:   {:.2}", s.current_equity);
    println!("Peak equity:      {:.2}", s.peak_equity);
    println!("Total PnL:        {:.2}", s.total_pnl);
    println!("Drawdown:         {:.2}%", s.current_drawdown * 100.0);
    println!("Max drawdown:     {:.2}%", s.max_drawdown * 100.0);
    println!("Sharpe (365):     {:.3}", s.sharpe_ratio);
    println!(
        "Closed trades:    {} ({} W / {} L)",
        s.stats.trades, s.stats.wins, s.stats.losses
    );
    if let Some(halt) = &s.halt {
        println!("HALTED:           {}", halt.reason);
    }
    if s.weekly_reduction {
        println!("Weekly size reduction active");
    }
    if !s.positions.is_empty() {
        println!();
        println!("{:<10} {:<6} {:>12} {:>12} {:>6}", "Symbol", "Side", "Qty", "Entry", "Lev");
        println!("{}", "-".repeat(50));
        for p in &s.positions {
            println!(
                "{:<10} {:<6} {:>12.6} {:>12.4} {:>5.1}x",
                p.symbol, p.side, p.quantity, p.entry_price, p.leverage
            );
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_rate_prints_as_percentage() {
        assert_eq!(win_rate_line(0.6, 3, 2), "60.0% (3 W / 2 L)");
        assert_eq!(win_rate_line(0.0, 0, 0), "0.0% (0 W / 0 L)");
    }

    #[test]
    fn walk_forward_flags_parse() {
        let cli = Cli::try_parse_from([
            "trendguard",
            "walk-forward",
            "--in-sample",
            "100",
            "--out-of-sample",
            "50",
        ])
        .unwrap();
        match cli.command {
            Commands::WalkForward {
                in_sample,
                out_of_sample,
                ..
            } => {
                assert_eq!(in_sample, Some(100));
                assert_eq!(out_of_sample, Some(50));
            }
            _ => panic!("expected walk-forward"),
        }
    }
}
