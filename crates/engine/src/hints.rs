//! Inbox for externally supplied override hints
//!
//! Holds at most one pending hint per symbol. A newer submission replaces the
//! pending one; the orchestrator takes it on the symbol's next cycle.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{Decision, Symbol};

#[derive(Debug, Default)]
pub struct HintInbox {
    pending: Mutex<HashMap<Symbol, Decision>>,
}

impl HintInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a hint, returning the one it replaced
    pub fn submit(&self, symbol: Symbol, hint: Decision) -> Option<Decision> {
        self.pending.lock().unwrap().insert(symbol, hint)
    }

    pub fn take(&self, symbol: &Symbol) -> Option<Decision> {
        self.pending.lock().unwrap().remove(symbol)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    #[test]
    fn test_one_pending_hint_per_symbol() {
        let inbox = HintInbox::new();
        let sym = Symbol::parse("eurusd").unwrap();
        assert!(inbox
            .submit(sym.clone(), Decision::new(Direction::Buy, 0.7))
            .is_none());
        let replaced = inbox.submit(sym.clone(), Decision::new(Direction::Sell, 0.8));
        assert_eq!(replaced.unwrap().direction, Direction::Buy);
        assert_eq!(inbox.pending_count(), 1);

        assert_eq!(inbox.take(&sym).unwrap().direction, Direction::Sell);
        assert!(inbox.take(&sym).is_none());
        assert_eq!(inbox.pending_count(), 0);
    }
}
