//! Core types shared by the history, indicator, decision and gate layers

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Symbol
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("symbol is empty")]
    Empty,
}

/// Canonical symbol key (e.g. `EUR/USD`).
///
/// `eurusd`, `EUR-USD`, `eur_usd` and `EUR/USD` all resolve to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let cleaned: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | '_' | ' ' => '/',
                other => other.to_ascii_uppercase(),
            })
            .collect();

        let parts: Vec<&str> = cleaned.split('/').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Err(SymbolError::Empty);
        }
        if parts.len() > 1 {
            return Ok(Self(parts.join("/")));
        }

        let code = parts[0];
        if code.len() == 6 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(format!("{}/{}", &code[..3], &code[3..])))
        } else {
            Ok(Self(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Observations
// ============================================================================

/// One observed price: a close, plus the open when the source is a candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub at: DateTime<Utc>,
    pub close: Decimal,
    pub open: Option<Decimal>,
}

impl PriceObservation {
    pub fn new(at: DateTime<Utc>, close: Decimal) -> Self {
        Self {
            at,
            close,
            open: None,
        }
    }

    pub fn candle(at: DateTime<Utc>, open: Decimal, close: Decimal) -> Self {
        Self {
            at,
            close,
            open: Some(open),
        }
    }

    /// Close as f64 for the indicator layer
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(f64::NAN)
    }
}

// ============================================================================
// Decisions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    None,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
            Direction::None => "NONE",
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Direction::None)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction plus a confidence in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub direction: Direction,
    pub confidence: f64,
}

impl Decision {
    pub fn new(direction: Direction, confidence: f64) -> Self {
        Self {
            direction,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn none() -> Self {
        Self {
            direction: Direction::None,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalization_variants() {
        let canonical = Symbol::parse("EUR/USD").unwrap();
        for raw in ["eurusd", "EURUSD", "eur/usd", "EUR-USD", "eur_usd", " EUR USD "] {
            assert_eq!(Symbol::parse(raw).unwrap(), canonical, "raw = {raw:?}");
        }
        assert_eq!(canonical.as_str(), "EUR/USD");
    }

    #[test]
    fn test_symbol_keeps_non_pair_codes() {
        assert_eq!(Symbol::parse("aapl").unwrap().as_str(), "AAPL");
        assert_eq!(Symbol::parse("btc-usdt").unwrap().as_str(), "BTC/USDT");
        assert_eq!(Symbol::parse("BTCUSDT").unwrap().as_str(), "BTCUSDT");
    }

    #[test]
    fn test_symbol_rejects_empty() {
        assert_eq!(Symbol::parse("  "), Err(SymbolError::Empty));
        assert_eq!(Symbol::parse("//"), Err(SymbolError::Empty));
    }

    #[test]
    fn test_symbol_serde_normalizes() {
        let sym: Symbol = serde_json::from_str("\"audusd\"").unwrap();
        assert_eq!(sym.as_str(), "AUD/USD");
        assert_eq!(serde_json::to_string(&sym).unwrap(), "\"AUD/USD\"");
    }

    #[test]
    fn test_decision_clamps_confidence() {
        assert_eq!(Decision::new(Direction::Buy, 1.7).confidence, 1.0);
        assert_eq!(Decision::new(Direction::Sell, -0.2).confidence, 0.0);
        assert_eq!(Decision::none().direction, Direction::None);
    }

    #[test]
    fn test_direction_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Direction::Buy).unwrap(), "\"BUY\"");
        let d: Direction = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(d, Direction::Sell);
    }
}
