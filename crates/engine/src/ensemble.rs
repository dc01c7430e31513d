//! Weighted-vote ensemble over the indicator set
//!
//! Each indicator adds a fixed weight to the buy or sell side when its
//! condition holds; undefined indicators abstain. The normalized vote share
//! becomes the confidence. An externally supplied hint can stand in for the
//! vote, subject to an RSI sanity check.

use serde::{Deserialize, Serialize};

use crate::indicators::{rsi, IndicatorSet, RSI_PERIOD};
use crate::types::{Decision, Direction};

const W_EMA_CROSS: f64 = 1.2;
const W_SMA_CROSS: f64 = 0.6;
const W_RSI: f64 = 0.9;
const W_BOLLINGER: f64 = 0.7;
const W_MACD: f64 = 0.8;

const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
/// Hints against an RSI beyond these bounds get their confidence halved
const RSI_EXTREME_LOW: f64 = 20.0;
const RSI_EXTREME_HIGH: f64 = 80.0;

const VOTE_EPSILON: f64 = 1e-9;

/// Thresholds for turning votes into a direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Required lead of one side's normalized share over the other
    pub diff_threshold: f64,
    pub min_confidence: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            diff_threshold: 0.2,
            min_confidence: 0.6,
        }
    }
}

/// What the decision is based on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecisionBasis {
    /// Vote over the indicators
    Ensemble,
    /// Externally supplied direction and confidence
    Override(Decision),
}

/// Raw vote totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Votes {
    pub buy: f64,
    pub sell: f64,
}

impl Votes {
    pub fn tally(set: &IndicatorSet) -> Self {
        let mut votes = Votes::default();

        if let (Some(fast), Some(slow)) = (set.ema_9, set.ema_21) {
            votes.side(fast > slow, W_EMA_CROSS);
        }
        if let (Some(fast), Some(slow)) = (set.sma_3, set.sma_8) {
            votes.side(fast > slow, W_SMA_CROSS);
        }
        if let Some(r) = set.rsi_14 {
            if r < RSI_OVERSOLD {
                votes.buy += W_RSI;
            } else if r > RSI_OVERBOUGHT {
                votes.sell += W_RSI;
            }
        }
        if let (Some(bb), Some(price)) = (set.bollinger_20, set.last_price) {
            if price < bb.lower {
                votes.buy += W_BOLLINGER;
            } else if price > bb.upper {
                votes.sell += W_BOLLINGER;
            }
        }
        if let Some(m) = set.macd {
            votes.side(m.histogram > 0.0, W_MACD);
        }

        votes
    }

    fn side(&mut self, bullish: bool, weight: f64) {
        if bullish {
            self.buy += weight;
        } else {
            self.sell += weight;
        }
    }

    /// Normalized (buy, sell) shares
    pub fn shares(&self) -> (f64, f64) {
        let total = self.buy + self.sell + VOTE_EPSILON;
        (self.buy / total, self.sell / total)
    }
}

/// Decision together with the inputs that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assessment {
    pub decision: Decision,
    pub indicators: IndicatorSet,
    pub votes: Option<Votes>,
    pub overridden: bool,
}

/// Stateless decision engine; only holds its thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct Ensemble {
    config: EnsembleConfig,
}

impl Ensemble {
    pub fn new(config: EnsembleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.config
    }

    pub fn decide(&self, series: &[f64], min_history: usize, basis: DecisionBasis) -> Decision {
        match basis {
            DecisionBasis::Override(hint) => self.dampen(series, hint),
            DecisionBasis::Ensemble => {
                if series.len() < min_history {
                    return Decision::none();
                }
                self.vote(&Votes::tally(&IndicatorSet::compute(series)))
            }
        }
    }

    /// Same as [`Ensemble::decide`] but also returns the readings and votes
    pub fn assess(&self, series: &[f64], min_history: usize, basis: DecisionBasis) -> Assessment {
        let indicators = IndicatorSet::compute(series);
        match basis {
            DecisionBasis::Override(hint) => Assessment {
                decision: self.dampen(series, hint),
                indicators,
                votes: None,
                overridden: true,
            },
            DecisionBasis::Ensemble if series.len() < min_history => Assessment {
                decision: Decision::none(),
                indicators,
                votes: None,
                overridden: false,
            },
            DecisionBasis::Ensemble => {
                let votes = Votes::tally(&indicators);
                Assessment {
                    decision: self.vote(&votes),
                    indicators,
                    votes: Some(votes),
                    overridden: false,
                }
            }
        }
    }

    /// Turn vote totals into a decision; confidence is reported even on NONE
    pub fn vote(&self, votes: &Votes) -> Decision {
        let (b_norm, s_norm) = votes.shares();
        let confidence = b_norm.max(s_norm);
        let confident = confidence >= self.config.min_confidence;

        let direction = if b_norm - s_norm > self.config.diff_threshold && confident {
            Direction::Buy
        } else if s_norm - b_norm > self.config.diff_threshold && confident {
            Direction::Sell
        } else {
            Direction::None
        };
        Decision::new(direction, confidence)
    }

    fn dampen(&self, series: &[f64], hint: Decision) -> Decision {
        let mut confidence = hint.confidence.clamp(0.0, 1.0);

        if let Some(r) = rsi(series, RSI_PERIOD) {
            let contradicts = match hint.direction {
                Direction::Buy => r > RSI_EXTREME_HIGH,
                Direction::Sell => r < RSI_EXTREME_LOW,
                Direction::None => false,
            };
            if contradicts {
                confidence /= 2.0;
            }
        }

        if hint.direction.is_actionable() && confidence >= self.config.min_confidence {
            Decision::new(hint.direction, confidence)
        } else {
            Decision::new(Direction::None, confidence)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{BollingerReading, MacdReading};

    fn linear(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    fn engine() -> Ensemble {
        Ensemble::new(EnsembleConfig::default())
    }

    #[test]
    fn test_below_min_history_is_none() {
        let s = linear(1.1, 0.001, 20);
        let d = engine().decide(&s, 21, DecisionBasis::Ensemble);
        assert_eq!(d, Decision::none());
    }

    #[test]
    fn test_all_buy_aligned_readings() {
        let set = IndicatorSet {
            last_price: Some(1.0),
            ema_9: Some(1.2),
            ema_21: Some(1.1),
            sma_3: Some(1.25),
            sma_8: Some(1.15),
            rsi_14: Some(25.0),
            bollinger_20: Some(BollingerReading {
                lower: 1.05,
                middle: 1.15,
                upper: 1.25,
            }),
            macd: Some(MacdReading {
                macd: 0.02,
                signal: 0.01,
                histogram: 0.01,
            }),
        };
        let votes = Votes::tally(&set);
        assert!((votes.buy - 4.2).abs() < 1e-12);
        assert_eq!(votes.sell, 0.0);

        let d = engine().vote(&votes);
        assert_eq!(d.direction, Direction::Buy);
        assert!(d.confidence > 0.999);
    }

    #[test]
    fn test_undefined_indicators_abstain() {
        let votes = Votes::tally(&IndicatorSet::default());
        assert_eq!(votes, Votes::default());
        let d = engine().vote(&votes);
        assert_eq!(d.direction, Direction::None);
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn test_rising_series_buys_despite_overbought_rsi() {
        // EMA + SMA buy (1.8) vs RSI=100 sell (0.9); MACD still undefined at 30 bars
        let s = linear(1.1010, 0.001, 30);
        let a = engine().assess(&s, 21, DecisionBasis::Ensemble);
        let votes = a.votes.unwrap();
        assert!((votes.buy - 1.8).abs() < 1e-12);
        assert!((votes.sell - 0.9).abs() < 1e-12);
        assert_eq!(a.decision.direction, Direction::Buy);
        assert!((a.decision.confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_falling_series_sells() {
        let s = linear(1.2, -0.001, 30);
        let d = engine().decide(&s, 21, DecisionBasis::Ensemble);
        assert_eq!(d.direction, Direction::Sell);
        assert!((d.confidence - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_close_vote_reports_confidence_on_none() {
        // With MACD defined the straight uptrend splits 1.8 / 1.7
        let s = linear(100.0, 1.0, 40);
        let d = engine().decide(&s, 21, DecisionBasis::Ensemble);
        assert_eq!(d.direction, Direction::None);
        assert!((d.confidence - 1.8 / 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_thresholds_come_from_config() {
        let votes = Votes { buy: 1.8, sell: 0.9 };
        let strict = Ensemble::new(EnsembleConfig {
            diff_threshold: 0.5,
            min_confidence: 0.6,
        });
        assert_eq!(strict.vote(&votes).direction, Direction::None);

        let demanding = Ensemble::new(EnsembleConfig {
            diff_threshold: 0.1,
            min_confidence: 0.7,
        });
        assert_eq!(demanding.vote(&votes).direction, Direction::None);

        let lenient = Ensemble::new(EnsembleConfig {
            diff_threshold: 0.1,
            min_confidence: 0.5,
        });
        assert_eq!(lenient.vote(&votes).direction, Direction::Buy);
    }

    #[test]
    fn test_override_dampened_by_contradicting_rsi() {
        // RSI = 100 contradicts BUY: 0.9 -> 0.45, below 0.6
        let s = linear(1.1, 0.001, 15);
        let hint = Decision::new(Direction::Buy, 0.9);
        let d = engine().decide(&s, 21, DecisionBasis::Override(hint));
        assert_eq!(d.direction, Direction::None);
        assert!((d.confidence - 0.45).abs() < 1e-12);

        // SELL agrees with an overbought market, so it passes untouched
        let hint = Decision::new(Direction::Sell, 0.9);
        let d = engine().decide(&s, 21, DecisionBasis::Override(hint));
        assert_eq!(d, Decision::new(Direction::Sell, 0.9));
    }

    #[test]
    fn test_override_ignores_min_history_and_missing_rsi() {
        let s = linear(1.1, -0.001, 5);
        let hint = Decision::new(Direction::Sell, 0.7);
        let d = engine().decide(&s, 21, DecisionBasis::Override(hint));
        assert_eq!(d, hint);
    }

    #[test]
    fn test_override_below_threshold_collapses() {
        let hint = Decision::new(Direction::Buy, 0.5);
        let d = engine().decide(&[], 21, DecisionBasis::Override(hint));
        assert_eq!(d.direction, Direction::None);
        assert_eq!(d.confidence, 0.5);
    }

    #[test]
    fn test_oversold_market_halves_sell_hint() {
        let s = linear(1.2, -0.001, 15);
        let hint = Decision::new(Direction::Sell, 1.0);
        let d = engine().decide(&s, 21, DecisionBasis::Override(hint));
        assert_eq!(d, Decision::new(Direction::None, 0.5));
    }
}
