//! Bounded, explicitly owned history stores.
//!
//! [`BoundedHistory`] is a fixed-capacity ring buffer that evicts its oldest
//! entry on overflow. [`SignalHistory`] keeps one such ring per symbol and is
//! passed to the scan loop by reference rather than living in a global.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trendguard_core::TrendSignal;

/// Equity history and signal history both default to this many samples.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedHistory<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> BoundedHistory<T> {
    /// A capacity of zero is treated as one; the latest value is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a value, returning the evicted oldest value if the buffer was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(value);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Default for BoundedHistory<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

// ─── Signal history ─────────────────────────────────────────────────

/// A signal as observed by the scan loop, stamped with its candle time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub at: DateTime<Utc>,
    pub price: f64,
    pub signal: TrendSignal,
}

/// Per-symbol ring of recent signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalHistory {
    per_symbol_capacity: usize,
    by_symbol: BTreeMap<String, BoundedHistory<SignalRecord>>,
}

impl SignalHistory {
    pub fn new(per_symbol_capacity: usize) -> Self {
        Self {
            per_symbol_capacity,
            by_symbol: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, symbol: &str, record: SignalRecord) {
        let capacity = self.per_symbol_capacity;
        self.by_symbol
            .entry(symbol.to_string())
            .or_insert_with(|| BoundedHistory::new(capacity))
            .push(record);
    }

    pub fn latest(&self, symbol: &str) -> Option<&SignalRecord> {
        self.by_symbol.get(symbol).and_then(|h| h.latest())
    }

    /// Oldest to newest; empty for an unknown symbol.
    pub fn recent(&self, symbol: &str) -> Vec<&SignalRecord> {
        self.by_symbol
            .get(symbol)
            .map(|h| h.iter().collect())
            .unwrap_or_default()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.by_symbol.keys().map(String::as_str)
    }

    /// Total records across all symbols.
    pub fn len(&self) -> usize {
        self.by_symbol.values().map(BoundedHistory::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SignalHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
