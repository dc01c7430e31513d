//! Collaborator interfaces and their HTTP implementations
//!
//! The orchestrator only sees [`PriceSource`] and [`Notifier`]; the concrete
//! clients (TwelveData, Telegram) live in the submodules.

pub mod telegram;
pub mod twelvedata;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::error::{NotifyError, SourceError};
use crate::types::{Direction, PriceObservation, Symbol};

pub use telegram::TelegramNotifier;
pub use twelvedata::TwelveDataClient;

/// Supplies the latest observation for a symbol
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_latest(&self, symbol: &Symbol) -> Result<PriceObservation, SourceError>;
}

/// Delivers emitted signals
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, alert: &SignalAlert) -> Result<(), NotifyError>;
}

/// An emitted signal with the context needed to describe it
#[derive(Debug, Clone, Serialize)]
pub struct SignalAlert {
    pub symbol: Symbol,
    pub direction: Direction,
    pub confidence: f64,
    pub close: Decimal,
    pub open: Option<Decimal>,
    pub observed_at: DateTime<Utc>,
    pub emitted_at: DateTime<Utc>,
    pub overridden: bool,
}

impl SignalAlert {
    /// One-line human readable message, e.g.
    /// `EUR/USD 2024-03-01 12:00 OPEN 1.1000 CLOSE 1.1010 => BUY (conf 0.67)`
    pub fn message(&self) -> String {
        let open = self
            .open
            .map(|o| format!(" OPEN {o}"))
            .unwrap_or_default();
        let source = if self.overridden { " [hint]" } else { "" };
        format!(
            "{} {}{} CLOSE {} => {} (conf {:.2}){}",
            self.symbol,
            self.observed_at.format("%Y-%m-%d %H:%M"),
            open,
            self.close,
            self.direction,
            self.confidence,
            source
        )
    }
}

/// Fallback notifier used when Telegram is not configured
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, alert: &SignalAlert) -> Result<(), NotifyError> {
        info!(message = %alert.message(), "Telegram not configured; not sending");
        Ok(())
    }
}
