//! Criterion benchmarks for the indicator library and signal generation.
//!
//! Benchmarks:
//! 1. Single indicators over growing candle counts
//! 2. Full signal generation (every indicator the generator needs)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trendguard_core::data::synthetic_candles;
use trendguard_core::indicators::{adx, atr, ema, macd, rsi};
use trendguard_core::signals::TrendSignalGenerator;

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");

    for &count in &[500, 2_000, 10_000] {
        let candles = synthetic_candles("BENCH", count, 1);

        group.bench_with_input(BenchmarkId::new("ema_50", count), &count, |b, _| {
            b.iter(|| ema(black_box(&candles), 50));
        });
        group.bench_with_input(BenchmarkId::new("rsi_14", count), &count, |b, _| {
            b.iter(|| rsi(black_box(&candles), 14));
        });
        group.bench_with_input(BenchmarkId::new("atr_14", count), &count, |b, _| {
            b.iter(|| atr(black_box(&candles), 14));
        });
        group.bench_with_input(BenchmarkId::new("adx_14", count), &count, |b, _| {
            b.iter(|| adx(black_box(&candles), 14));
        });
        group.bench_with_input(BenchmarkId::new("macd", count), &count, |b, _| {
            b.iter(|| macd(black_box(&candles), 12, 26, 9));
        });
    }

    group.finish();
}

fn bench_signal(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal");
    let generator = TrendSignalGenerator::default();

    for &count in &[100, 500, 1_000] {
        let candles = synthetic_candles("BENCH", count, 2);
        group.bench_with_input(BenchmarkId::new("generate", count), &count, |b, _| {
            b.iter(|| generator.generate(black_box(&candles)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_indicators, bench_signal);
criterion_main!(benches);
