//! Bounded per-symbol price history
//!
//! Each symbol owns a FIFO ring of at most `capacity` observations. Readers get
//! owned snapshots, so a snapshot taken before an append never observes it.

use std::collections::{HashMap, VecDeque};

use crate::types::{PriceObservation, Symbol};

/// Fixed-capacity ring of observations for one symbol
#[derive(Debug, Clone)]
pub struct PriceBuffer {
    capacity: usize,
    observations: VecDeque<PriceObservation>,
}

impl PriceBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            observations: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn push(&mut self, observation: PriceObservation) {
        if self.observations.len() >= self.capacity {
            self.observations.pop_front();
        }
        self.observations.push_back(observation);
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn last(&self) -> Option<&PriceObservation> {
        self.observations.back()
    }

    /// Closes, oldest first
    pub fn closes(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.close_f64()).collect()
    }
}

/// Per-symbol price buffers sharing one capacity.
///
/// Unknown symbols read as empty histories rather than errors.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    capacity: usize,
    buffers: HashMap<Symbol, PriceBuffer>,
}

impl PriceHistory {
    /// Panics if `capacity` is zero; configuration rejects that before we get here.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "price history capacity must be positive");
        Self {
            capacity,
            buffers: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&mut self, symbol: &Symbol, observation: PriceObservation) {
        let capacity = self.capacity;
        self.buffers
            .entry(symbol.clone())
            .or_insert_with(|| PriceBuffer::new(capacity))
            .push(observation);
    }

    pub fn snapshot(&self, symbol: &Symbol) -> Vec<f64> {
        self.buffers
            .get(symbol)
            .map(PriceBuffer::closes)
            .unwrap_or_default()
    }

    pub fn size(&self, symbol: &Symbol) -> usize {
        self.buffers.get(symbol).map(PriceBuffer::len).unwrap_or(0)
    }

    pub fn last(&self, symbol: &Symbol) -> Option<&PriceObservation> {
        self.buffers.get(symbol).and_then(PriceBuffer::last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rand::Rng;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn obs(i: i64, close: Decimal) -> PriceObservation {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        PriceObservation::new(t0 + Duration::minutes(i), close)
    }

    fn eurusd() -> Symbol {
        Symbol::parse("EUR/USD").unwrap()
    }

    #[test]
    fn test_unknown_symbol_reads_empty() {
        let history = PriceHistory::new(5);
        let sym = eurusd();
        assert_eq!(history.size(&sym), 0);
        assert!(history.last(&sym).is_none());
        assert!(history.snapshot(&sym).is_empty());
    }

    #[test]
    fn test_evicts_oldest_beyond_capacity() {
        let mut history = PriceHistory::new(3);
        let sym = eurusd();
        for (i, close) in [dec!(1.1), dec!(1.2), dec!(1.3), dec!(1.4), dec!(1.5)]
            .into_iter()
            .enumerate()
        {
            history.append(&sym, obs(i as i64, close));
        }
        assert_eq!(history.size(&sym), 3);
        assert_eq!(history.snapshot(&sym), vec![1.3, 1.4, 1.5]);
        assert_eq!(history.last(&sym).unwrap().close, dec!(1.5));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let mut history = PriceHistory::new(10);
        let sym = eurusd();
        history.append(&sym, obs(0, dec!(1.10)));
        let snap = history.snapshot(&sym);
        history.append(&sym, obs(1, dec!(1.11)));
        assert_eq!(snap, vec![1.10]);
        assert_eq!(history.size(&sym), 2);
    }

    #[test]
    fn test_symbols_are_independent() {
        let mut history = PriceHistory::new(4);
        let eur = eurusd();
        let aud = Symbol::parse("audusd").unwrap();
        history.append(&eur, obs(0, dec!(1.1)));
        history.append(&aud, obs(0, dec!(0.65)));
        history.append(&aud, obs(1, dec!(0.66)));
        assert_eq!(history.size(&eur), 1);
        assert_eq!(history.size(&aud), 2);
    }

    #[test]
    fn test_capacity_never_exceeded_random_appends() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let capacity = rng.gen_range(1..40);
            let appends = rng.gen_range(0..120);
            let mut history = PriceHistory::new(capacity);
            let sym = eurusd();
            let mut appended = Vec::new();
            for i in 0..appends {
                let cents: i64 = rng.gen_range(10_000..12_000);
                let close = Decimal::new(cents, 4);
                appended.push(obs(i, close).close_f64());
                history.append(&sym, obs(i, close));
                assert!(history.size(&sym) <= capacity);
            }
            let keep = appended.len().min(capacity);
            assert_eq!(history.size(&sym), keep);
            assert_eq!(history.snapshot(&sym), appended[appended.len() - keep..].to_vec());
        }
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_rejected() {
        let _ = PriceHistory::new(0);
    }
}
