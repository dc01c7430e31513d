//! FX Sniper Engine — indicator ensemble signals for currency pairs
//!
//! Provides:
//! - Bounded per-symbol price history
//! - Technical indicators (EMA, SMA, RSI, Bollinger, MACD) and a weighted vote
//! - Emission gate with confidence threshold and per-symbol cooldown
//! - TwelveData price source and Telegram notifier
//! - The polling orchestrator tying them together

pub mod api;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod gate;
pub mod hints;
pub mod history;
pub mod indicators;
pub mod sniper;
pub mod types;

// Re-exports for convenience
pub use api::{LogNotifier, Notifier, PriceSource, SignalAlert, TelegramNotifier, TwelveDataClient};
pub use config::{parse_pairs, SniperConfig};
pub use ensemble::{Assessment, DecisionBasis, Ensemble, EnsembleConfig, Votes};
pub use error::{NotifyError, SourceError};
pub use gate::{EmittedSignal, GateConfig, SignalGate};
pub use hints::HintInbox;
pub use history::PriceHistory;
pub use indicators::IndicatorSet;
pub use sniper::{run_sniper, CycleOutcome, Sniper, SniperProgress, SniperStatus, SymbolStatus};
pub use types::*;
