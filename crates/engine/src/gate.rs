//! Per-symbol emission gate
//!
//! Decides whether a fresh decision should become a notification: enough
//! confidence, outside the cooldown, and a change of direction from the last
//! emitted signal. State is recorded only when the gate emits.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Direction, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub min_confidence: f64,
    pub cooldown_secs: i64,
    /// When true the cooldown also blocks a changed direction; when false it
    /// only blocks repeats of the last direction.
    pub cooldown_applies_across_direction_change: bool,
}

impl GateConfig {
    /// Cooldown window; values beyond chrono's range saturate
    pub fn cooldown(&self) -> Duration {
        Duration::try_seconds(self.cooldown_secs).unwrap_or(Duration::MAX)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            cooldown_secs: 300,
            cooldown_applies_across_direction_change: true,
        }
    }
}

/// Last emitted signal for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedSignal {
    pub direction: Direction,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SignalGate {
    config: GateConfig,
    last: HashMap<Symbol, EmittedSignal>,
}

impl SignalGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            last: HashMap::new(),
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn last_emitted(&self, symbol: &Symbol) -> Option<EmittedSignal> {
        self.last.get(symbol).copied()
    }

    /// Returns true when the signal should be emitted, recording it as the
    /// symbol's last signal. Returns false without touching state otherwise.
    pub fn should_emit(
        &mut self,
        symbol: &Symbol,
        direction: Direction,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> bool {
        if !direction.is_actionable() || confidence < self.config.min_confidence {
            return false;
        }

        let emit = match self.last.get(symbol) {
            None => true,
            Some(last) => {
                let in_cooldown = now - last.at < self.config.cooldown();
                let same = last.direction == direction;
                if in_cooldown && (same || self.config.cooldown_applies_across_direction_change) {
                    false
                } else {
                    !same
                }
            }
        };

        if emit {
            self.last
                .insert(symbol.clone(), EmittedSignal { direction, at: now });
        }
        emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn secs(s: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(s)
    }

    fn eurusd() -> Symbol {
        Symbol::parse("EUR/USD").unwrap()
    }

    fn gate(across: bool) -> SignalGate {
        SignalGate::new(GateConfig {
            min_confidence: 0.6,
            cooldown_secs: 60,
            cooldown_applies_across_direction_change: across,
        })
    }

    #[test]
    fn test_cooldown_sequence_unconditional() {
        let mut g = gate(true);
        let sym = eurusd();
        assert!(g.should_emit(&sym, Direction::Buy, 0.8, t0()));
        assert!(!g.should_emit(&sym, Direction::Buy, 0.8, secs(10)));
        assert!(!g.should_emit(&sym, Direction::Sell, 0.8, secs(10)));
        assert!(g.should_emit(&sym, Direction::Sell, 0.8, secs(70)));

        let last = g.last_emitted(&sym).unwrap();
        assert_eq!(last.direction, Direction::Sell);
        assert_eq!(last.at, secs(70));
    }

    #[test]
    fn test_direction_change_within_cooldown_when_policy_relaxed() {
        let mut g = gate(false);
        let sym = eurusd();
        assert!(g.should_emit(&sym, Direction::Buy, 0.8, t0()));
        assert!(!g.should_emit(&sym, Direction::Buy, 0.8, secs(10)));
        assert!(g.should_emit(&sym, Direction::Sell, 0.8, secs(10)));
        assert_eq!(g.last_emitted(&sym).unwrap().at, secs(10));
    }

    #[test]
    fn test_same_direction_never_repeats_after_cooldown() {
        let mut g = gate(true);
        let sym = eurusd();
        assert!(g.should_emit(&sym, Direction::Buy, 0.8, t0()));
        assert!(!g.should_emit(&sym, Direction::Buy, 0.9, secs(3600)));
        assert_eq!(g.last_emitted(&sym).unwrap().at, t0());
    }

    #[test]
    fn test_low_confidence_leaves_state_untouched() {
        let mut g = gate(true);
        let sym = eurusd();
        assert!(!g.should_emit(&sym, Direction::Buy, 0.59, t0()));
        assert!(g.last_emitted(&sym).is_none());
        assert!(g.should_emit(&sym, Direction::Buy, 0.6, secs(1)));
    }

    #[test]
    fn test_none_never_emits() {
        let mut g = gate(true);
        let sym = eurusd();
        assert!(!g.should_emit(&sym, Direction::None, 1.0, t0()));
        assert!(g.last_emitted(&sym).is_none());

        assert!(g.should_emit(&sym, Direction::Sell, 0.7, secs(1)));
        assert!(!g.should_emit(&sym, Direction::None, 1.0, secs(500)));
        assert_eq!(g.last_emitted(&sym).unwrap().direction, Direction::Sell);
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        let mut g = gate(true);
        let sym = eurusd();
        assert!(g.should_emit(&sym, Direction::Buy, 0.8, t0()));
        assert!(!g.should_emit(&sym, Direction::Sell, 0.8, secs(59)));
        assert!(g.should_emit(&sym, Direction::Sell, 0.8, secs(60)));
    }

    #[test]
    fn test_symbols_have_separate_state() {
        let mut g = gate(true);
        let eur = eurusd();
        let aud = Symbol::parse("AUD/USD").unwrap();
        assert!(g.should_emit(&eur, Direction::Buy, 0.8, t0()));
        assert!(g.should_emit(&aud, Direction::Buy, 0.8, secs(5)));
        assert!(g.last_emitted(&Symbol::parse("GBP/USD").unwrap()).is_none());
    }

    #[test]
    fn test_oversized_cooldown_saturates() {
        let mut g = SignalGate::new(GateConfig {
            cooldown_secs: i64::MAX,
            ..GateConfig::default()
        });
        let sym = eurusd();
        assert!(g.should_emit(&sym, Direction::Buy, 0.8, t0()));
        assert!(!g.should_emit(&sym, Direction::Sell, 0.8, secs(10)));
        assert!(!g.should_emit(&sym, Direction::Sell, 0.8, secs(86_400 * 365)));
    }
}
