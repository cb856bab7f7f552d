//! Deterministic synthetic candle generator.
//!
//! Produces an hourly random walk from a starting price of 100.0, split into
//! phases of 40..120 candles that each carry a drift (up, down or flat). The
//! phases give the trend generator real crossovers to find. The series is
//! seeded from BLAKE3 over `(symbol, seed)` so every caller sees the same
//! candles for the same inputs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::Candle;

const START_PRICE: f64 = 100.0;
const MIN_PHASE: usize = 40;
const MAX_PHASE: usize = 120;
/// Per-candle drift applied during trending phases.
const PHASE_DRIFT: f64 = 0.004;
const NOISE: f64 = 0.006;

/// First timestamp of every synthetic series.
pub fn synthetic_origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn rng_for(symbol: &str, seed: u64) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(&seed.to_le_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

/// Generate `n` hourly candles for `symbol`. Output passes `validate_candles`.
pub fn synthetic_candles(symbol: &str, n: usize, seed: u64) -> Vec<Candle> {
    let mut rng = rng_for(symbol, seed);
    let origin = synthetic_origin();

    let mut candles = Vec::with_capacity(n);
    let mut price = START_PRICE;
    let mut phase_left = 0usize;
    let mut drift = 0.0_f64;

    for i in 0..n {
        if phase_left == 0 {
            phase_left = rng.gen_range(MIN_PHASE..=MAX_PHASE);
            drift = match rng.gen_range(0..3) {
                0 => PHASE_DRIFT,
                1 => -PHASE_DRIFT,
                _ => 0.0,
            };
        }
        phase_left -= 1;

        let ret = drift + rng.gen_range(-NOISE..NOISE);
        let open = price;
        let close = (price * (1.0 + ret)).max(0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.004));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.004));
        let volume = rng.gen_range(100.0..10_000.0);

        candles.push(Candle {
            timestamp: origin + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
    }

    candles
}
