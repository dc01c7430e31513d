//! Sniper configuration from environment variables
//!
//! | Variable | Default |
//! |---|---|
//! | `SNIPER_PAIRS` | `EUR/USD,AUD/USD` |
//! | `SNIPER_INTERVAL` | `60` (seconds) |
//! | `SNIPER_PAIR_DELAY_MS` | `200` |
//! | `SNIPER_HISTORY_CAPACITY` | `200` |
//! | `SNIPER_MIN_HISTORY` | `21` |
//! | `SNIPER_MIN_CONFIDENCE` | `0.6` |
//! | `SNIPER_DIFF_THRESHOLD` | `0.2` |
//! | `SNIPER_COOLDOWN_SECS` | `300` |
//! | `SNIPER_COOLDOWN_ACROSS_DIRECTION` | `true` |
//! | `TWELVEDATA_API_KEY` | none |
//! | `TELEGRAM_TOKEN` / `TELEGRAM_CHAT_ID` | none |
//! | `SNIPER_DB_PATH` | `data/signals.db` |

use anyhow::{bail, Context};
use std::str::FromStr;
use std::time::Duration;

use crate::ensemble::EnsembleConfig;
use crate::gate::GateConfig;
use crate::types::Symbol;

const DEFAULT_PAIRS: &str = "EUR/USD,AUD/USD";

#[derive(Debug, Clone)]
pub struct SniperConfig {
    pub pairs: Vec<Symbol>,
    pub poll_interval: Duration,
    /// Pause between symbols inside one cycle (provider rate limit)
    pub pair_delay: Duration,
    pub history_capacity: usize,
    pub min_history: usize,
    pub ensemble: EnsembleConfig,
    pub gate: GateConfig,
    pub twelvedata_api_key: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub db_path: String,
}

impl SniperConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pairs = parse_pairs(&lookup("SNIPER_PAIRS").unwrap_or_else(|| DEFAULT_PAIRS.into()))?;

        let interval_secs: u64 = parse_or(&lookup, "SNIPER_INTERVAL", 60)?;
        if interval_secs == 0 {
            bail!("SNIPER_INTERVAL must be at least 1 second");
        }
        let history_capacity: usize = parse_or(&lookup, "SNIPER_HISTORY_CAPACITY", 200)?;
        if history_capacity == 0 {
            bail!("SNIPER_HISTORY_CAPACITY must be positive");
        }

        let min_confidence: f64 = parse_or(&lookup, "SNIPER_MIN_CONFIDENCE", 0.6)?;
        if !(0.0..=1.0).contains(&min_confidence) {
            bail!("SNIPER_MIN_CONFIDENCE must be within [0, 1], got {min_confidence}");
        }
        let diff_threshold: f64 = parse_or(&lookup, "SNIPER_DIFF_THRESHOLD", 0.2)?;

        let cooldown_secs: i64 = parse_or(&lookup, "SNIPER_COOLDOWN_SECS", 300)?;
        if cooldown_secs < 0 {
            bail!("SNIPER_COOLDOWN_SECS must not be negative");
        }
        if chrono::Duration::try_seconds(cooldown_secs).is_none() {
            bail!("SNIPER_COOLDOWN_SECS is too large: {cooldown_secs}");
        }

        Ok(Self {
            pairs,
            poll_interval: Duration::from_secs(interval_secs),
            pair_delay: Duration::from_millis(parse_or(&lookup, "SNIPER_PAIR_DELAY_MS", 200)?),
            history_capacity,
            min_history: parse_or(&lookup, "SNIPER_MIN_HISTORY", 21)?,
            ensemble: EnsembleConfig {
                diff_threshold,
                min_confidence,
            },
            gate: GateConfig {
                min_confidence,
                cooldown_secs,
                cooldown_applies_across_direction_change: parse_or(
                    &lookup,
                    "SNIPER_COOLDOWN_ACROSS_DIRECTION",
                    true,
                )?,
            },
            twelvedata_api_key: non_empty(lookup("TWELVEDATA_API_KEY")),
            telegram_token: non_empty(lookup("TELEGRAM_TOKEN")),
            telegram_chat_id: non_empty(lookup("TELEGRAM_CHAT_ID")),
            db_path: lookup("SNIPER_DB_PATH").unwrap_or_else(|| "data/signals.db".into()),
        })
    }

    pub fn telegram_configured(&self) -> bool {
        self.telegram_token.is_some() && self.telegram_chat_id.is_some()
    }
}

/// Parse a comma separated pair list, dropping duplicates after normalization
pub fn parse_pairs(raw: &str) -> anyhow::Result<Vec<Symbol>> {
    let mut pairs: Vec<Symbol> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let symbol = Symbol::parse(part).with_context(|| format!("invalid pair '{part}'"))?;
        if !pairs.contains(&symbol) {
            pairs.push(symbol);
        }
    }
    if pairs.is_empty() {
        bail!("no pairs configured");
    }
    Ok(pairs)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SniperConfig::from_lookup(lookup(&[])).unwrap();
        let names: Vec<&str> = config.pairs.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["EUR/USD", "AUD/USD"]);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.pair_delay, Duration::from_millis(200));
        assert_eq!(config.history_capacity, 200);
        assert_eq!(config.min_history, 21);
        assert_eq!(config.ensemble, EnsembleConfig::default());
        assert_eq!(config.gate, GateConfig::default());
        assert!(config.twelvedata_api_key.is_none());
        assert!(!config.telegram_configured());
        assert_eq!(config.db_path, "data/signals.db");
    }

    #[test]
    fn test_overrides() {
        let config = SniperConfig::from_lookup(lookup(&[
            ("SNIPER_PAIRS", "gbpusd, usd-jpy ,GBP/USD"),
            ("SNIPER_INTERVAL", "15"),
            ("SNIPER_MIN_CONFIDENCE", "0.7"),
            ("SNIPER_COOLDOWN_SECS", "60"),
            ("SNIPER_COOLDOWN_ACROSS_DIRECTION", "false"),
            ("TWELVEDATA_API_KEY", "demo"),
            ("TELEGRAM_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "42"),
        ]))
        .unwrap();
        let names: Vec<&str> = config.pairs.iter().map(Symbol::as_str).collect();
        assert_eq!(names, vec!["GBP/USD", "USD/JPY"]);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.ensemble.min_confidence, 0.7);
        assert_eq!(config.gate.min_confidence, 0.7);
        assert_eq!(config.gate.cooldown_secs, 60);
        assert!(!config.gate.cooldown_applies_across_direction_change);
        assert_eq!(config.twelvedata_api_key.as_deref(), Some("demo"));
        assert!(config.telegram_configured());
    }

    #[test]
    fn test_invalid_values_rejected() {
        for vars in [
            [("SNIPER_INTERVAL", "soon")],
            [("SNIPER_INTERVAL", "0")],
            [("SNIPER_HISTORY_CAPACITY", "0")],
            [("SNIPER_MIN_CONFIDENCE", "1.5")],
            [("SNIPER_COOLDOWN_SECS", "-1")],
            [("SNIPER_COOLDOWN_SECS", "10000000000000000")],
            [("SNIPER_COOLDOWN_ACROSS_DIRECTION", "maybe")],
            [("SNIPER_PAIRS", " , ")],
        ] {
            assert!(SniperConfig::from_lookup(lookup(&vars)).is_err(), "{vars:?}");
        }
    }

    #[test]
    fn test_blank_secrets_are_unset() {
        let config =
            SniperConfig::from_lookup(lookup(&[("TWELVEDATA_API_KEY", "  "), ("TELEGRAM_TOKEN", "")]))
                .unwrap();
        assert!(config.twelvedata_api_key.is_none());
        assert!(config.telegram_token.is_none());
    }

    #[test]
    fn test_cooldown_upper_bound() {
        let max_secs = i64::MAX / 1000;
        let config =
            SniperConfig::from_lookup(lookup(&[("SNIPER_COOLDOWN_SECS", &max_secs.to_string())]))
                .unwrap();
        assert_eq!(config.gate.cooldown_secs, max_secs);

        let over = (max_secs + 1).to_string();
        let err = SniperConfig::from_lookup(lookup(&[("SNIPER_COOLDOWN_SECS", &over)])).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
