//! Indicator library over a close series (oldest first)
//!
//! Every function is total: too little history (or a zero period) yields
//! `None`, never a fabricated zero. SMA, EMA and Bollinger feed the tail
//! window through fresh `ta` indicators; RSI and the MACD signal line are
//! computed by hand because their arithmetic differs from `ta`'s smoothed
//! variants.

use serde::{Deserialize, Serialize};
use ta::indicators::{BollingerBands, ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_MULT: f64 = 2.0;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Substituted for an empty side of the RSI ratio
const RSI_EPSILON: f64 = 1e-8;

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerReading {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

// ============================================================================
// Helpers
// ============================================================================

/// Last `period` values, or None when the series is shorter
fn tail(series: &[f64], period: usize) -> Option<&[f64]> {
    if period == 0 || series.len() < period {
        return None;
    }
    Some(&series[series.len() - period..])
}

/// Run a fresh streaming indicator over `window` and keep its final output
fn feed<I: Next<f64>>(mut indicator: I, window: &[f64]) -> Option<I::Output> {
    let mut out = None;
    for &x in window {
        out = Some(indicator.next(x));
    }
    out
}

// ============================================================================
// Indicators
// ============================================================================

/// Arithmetic mean of the last `period` values
pub fn sma(series: &[f64], period: usize) -> Option<f64> {
    let window = tail(series, period)?;
    feed(SimpleMovingAverage::new(period).ok()?, window)
}

/// EMA over the last `period` values, seeded with the oldest of them.
///
/// Known approximation: there is no separately warmed seed, so the value
/// differs from an EMA run over the full history.
pub fn ema(series: &[f64], period: usize) -> Option<f64> {
    let window = tail(series, period)?;
    feed(ExponentialMovingAverage::new(period).ok()?, window)
}

/// RSI from summed gains and losses over the last `period + 1` points.
///
/// One-signed windows read exactly 100 (gains only) or 0 (losses only); a
/// flat window gets epsilon on both sides and reads 50.
pub fn rsi(series: &[f64], period: usize) -> Option<f64> {
    let window = tail(series, period.checked_add(1)?)?;
    if period == 0 {
        return None;
    }

    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0_f64, 0.0_f64), |(g, l), delta| {
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    if losses == 0.0 && gains > 0.0 {
        return Some(100.0);
    }
    if gains == 0.0 && losses > 0.0 {
        return Some(0.0);
    }

    let gains = if gains == 0.0 { RSI_EPSILON } else { gains };
    let losses = if losses == 0.0 { RSI_EPSILON } else { losses };
    let rs = gains / losses;
    Some((100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0))
}

/// Bollinger bands: SMA ± mult · population stddev over the last `period` values
pub fn bollinger(series: &[f64], period: usize, mult: f64) -> Option<BollingerReading> {
    let window = tail(series, period)?;
    let out = feed(BollingerBands::new(period, mult).ok()?, window)?;
    Some(BollingerReading {
        lower: out.lower,
        middle: out.average,
        upper: out.upper,
    })
}

/// MACD line = EMA(fast) − EMA(slow).
///
/// The signal line is an EMA(signal) over a reconstructed MACD history where
/// each point is SMA(fast) − SMA(slow) of the series truncated at that bar.
/// This is not the textbook EMA-of-EMA cascade and gives different values.
pub fn macd(series: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdReading> {
    if fast == 0 || slow == 0 || signal == 0 || series.len() < slow + signal {
        return None;
    }

    let line = ema(series, fast)? - ema(series, slow)?;

    let first_end = series.len() - signal + 1;
    let reconstructed = (first_end..=series.len())
        .map(|end| {
            let truncated = &series[..end];
            Some(sma(truncated, fast)? - sma(truncated, slow)?)
        })
        .collect::<Option<Vec<f64>>>()?;

    let signal_line = ema(&reconstructed, signal)?;
    Some(MacdReading {
        macd: line,
        signal: signal_line,
        histogram: line - signal_line,
    })
}

// ============================================================================
// Readings used by the ensemble
// ============================================================================

/// All readings the ensemble votes on, computed fresh from one snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub last_price: Option<f64>,
    pub ema_9: Option<f64>,
    pub ema_21: Option<f64>,
    pub sma_3: Option<f64>,
    pub sma_8: Option<f64>,
    pub rsi_14: Option<f64>,
    pub bollinger_20: Option<BollingerReading>,
    pub macd: Option<MacdReading>,
}

impl IndicatorSet {
    pub fn compute(series: &[f64]) -> Self {
        Self {
            last_price: series.last().copied(),
            ema_9: ema(series, 9),
            ema_21: ema(series, 21),
            sma_3: sma(series, 3),
            sma_8: sma(series, 8),
            rsi_14: rsi(series, RSI_PERIOD),
            bollinger_20: bollinger(series, BOLLINGER_PERIOD, BOLLINGER_MULT),
            macd: macd(series, MACD_FAST, MACD_SLOW, MACD_SIGNAL),
        }
    }
}
