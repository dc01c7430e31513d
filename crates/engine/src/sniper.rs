//! Sniper loop — poll prices, decide, gate, notify
//!
//! One [`Sniper`] owns every piece of per-symbol mutable state (price history,
//! gate state, last decisions) and is driven by a single task, so cycles for a
//! symbol never overlap. Readers see the state through [`SniperProgress`],
//! which holds owned copies refreshed after every symbol cycle.

use chrono::{DateTime, Utc};
use persistence::repository::{NewSignal, SignalRepository};
use persistence::SqlitePool;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{Notifier, PriceSource, SignalAlert};
use crate::config::SniperConfig;
use crate::ensemble::{DecisionBasis, Ensemble};
use crate::gate::{EmittedSignal, SignalGate};
use crate::hints::HintInbox;
use crate::history::PriceHistory;
use crate::types::{Decision, Symbol};

const MAX_ALERTS: usize = 50;
const SLEEP_SLICE_MS: u64 = 500;

// ---------------------------------------------------------------------------
// Progress / status board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SniperStatus {
    Idle,
    Polling,
    Stopped,
}

/// Read-only view of one symbol
#[derive(Debug, Clone, Serialize)]
pub struct SymbolStatus {
    pub symbol: Symbol,
    pub history_len: usize,
    pub last_price: Option<Decimal>,
    pub last_observed_at: Option<DateTime<Utc>>,
    pub last_decision: Option<Decision>,
    pub last_signal: Option<EmittedSignal>,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SymbolStatus {
    fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            history_len: 0,
            last_price: None,
            last_observed_at: None,
            last_decision: None,
            last_signal: None,
            last_error: None,
            updated_at: None,
        }
    }
}

/// Shared status for the sniper loop (same pattern as the watcher progress)
pub struct SniperProgress {
    pub status: RwLock<SniperStatus>,
    pub cancelled: AtomicBool,
    pub cycles: AtomicU64,
    symbols: RwLock<BTreeMap<Symbol, SymbolStatus>>,
    alerts: RwLock<Vec<SignalAlert>>,
}

impl SniperProgress {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(SniperStatus::Idle),
            cancelled: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            symbols: RwLock::new(BTreeMap::new()),
            alerts: RwLock::new(Vec::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.status.read().unwrap(), SniperStatus::Polling)
    }

    pub fn snapshot(&self) -> Vec<SymbolStatus> {
        self.symbols.read().unwrap().values().cloned().collect()
    }

    pub fn symbol_status(&self, symbol: &Symbol) -> Option<SymbolStatus> {
        self.symbols.read().unwrap().get(symbol).cloned()
    }

    /// Most recent emitted alerts, newest first
    pub fn recent_alerts(&self) -> Vec<SignalAlert> {
        self.alerts.read().unwrap().clone()
    }

    fn register(&self, pairs: &[Symbol]) {
        let mut symbols = self.symbols.write().unwrap();
        for symbol in pairs {
            symbols
                .entry(symbol.clone())
                .or_insert_with(|| SymbolStatus::empty(symbol.clone()));
        }
    }

    fn publish(&self, status: SymbolStatus) {
        self.symbols
            .write()
            .unwrap()
            .insert(status.symbol.clone(), status);
    }

    fn record_error(&self, symbol: &Symbol, error: String, at: DateTime<Utc>) {
        let mut symbols = self.symbols.write().unwrap();
        let entry = symbols
            .entry(symbol.clone())
            .or_insert_with(|| SymbolStatus::empty(symbol.clone()));
        entry.last_error = Some(error);
        entry.updated_at = Some(at);
    }

    fn push_alert(&self, alert: SignalAlert) {
        let mut alerts = self.alerts.write().unwrap();
        alerts.insert(0, alert);
        alerts.truncate(MAX_ALERTS);
    }
}

impl Default for SniperProgress {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Sniper
// ---------------------------------------------------------------------------

/// What happened to one symbol in one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Fetch failed or the payload was malformed; nothing changed
    FetchFailed,
    /// Provider returned a bar we already have; nothing changed
    Stale,
    Decided { decision: Decision, emitted: bool },
}

pub struct Sniper {
    pairs: Vec<Symbol>,
    min_history: usize,
    poll_interval: Duration,
    pair_delay: Duration,
    history: PriceHistory,
    ensemble: Ensemble,
    gate: SignalGate,
    last_decisions: HashMap<Symbol, Decision>,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    hints: Arc<HintInbox>,
    db_pool: Option<SqlitePool>,
}

impl Sniper {
    pub fn new(
        config: &SniperConfig,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pairs: config.pairs.clone(),
            min_history: config.min_history,
            poll_interval: config.poll_interval,
            pair_delay: config.pair_delay,
            history: PriceHistory::new(config.history_capacity),
            ensemble: Ensemble::new(config.ensemble),
            gate: SignalGate::new(config.gate),
            last_decisions: HashMap::new(),
            source,
            notifier,
            hints: Arc::new(HintInbox::new()),
            db_pool: None,
        }
    }

    /// Share a hint inbox with whoever submits override hints
    pub fn with_hints(mut self, hints: Arc<HintInbox>) -> Self {
        self.hints = hints;
        self
    }

    /// Journal emitted signals to SQLite
    pub fn with_journal(mut self, db_pool: SqlitePool) -> Self {
        self.db_pool = Some(db_pool);
        self
    }

    pub fn pairs(&self) -> &[Symbol] {
        &self.pairs
    }

    pub fn last_emitted(&self, symbol: &Symbol) -> Option<EmittedSignal> {
        self.gate.last_emitted(symbol)
    }

    pub fn last_decision(&self, symbol: &Symbol) -> Option<Decision> {
        self.last_decisions.get(symbol).copied()
    }

    pub fn history_len(&self, symbol: &Symbol) -> usize {
        self.history.size(symbol)
    }

    /// Process every configured symbol once, in order
    pub async fn run_cycle(
        &mut self,
        progress: &SniperProgress,
        now: DateTime<Utc>,
    ) -> Vec<(Symbol, CycleOutcome)> {
        progress.register(&self.pairs);
        let pairs = self.pairs.clone();
        let mut outcomes = Vec::with_capacity(pairs.len());

        for (i, symbol) in pairs.iter().enumerate() {
            if progress.is_cancelled() {
                break;
            }
            if i > 0 && !self.pair_delay.is_zero() {
                tokio::time::sleep(self.pair_delay).await;
            }
            let outcome = self.poll_symbol(symbol, progress, now).await;
            outcomes.push((symbol.clone(), outcome));
        }

        progress.cycles.fetch_add(1, Ordering::Relaxed);
        outcomes
    }

    /// One symbol cycle: fetch → append → decide → gate → deliver
    pub async fn poll_symbol(
        &mut self,
        symbol: &Symbol,
        progress: &SniperProgress,
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        let observation = match self.source.fetch_latest(symbol).await {
            Ok(o) => o,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Price fetch failed; skipping this cycle");
                progress.record_error(symbol, e.to_string(), now);
                return CycleOutcome::FetchFailed;
            }
        };

        if let Some(last) = self.history.last(symbol) {
            if observation.at <= last.at {
                debug!(symbol = %symbol, at = %observation.at, "No new bar since last cycle");
                return CycleOutcome::Stale;
            }
        }

        self.history.append(symbol, observation.clone());
        let series = self.history.snapshot(symbol);

        let basis = match self.hints.take(symbol) {
            Some(hint) => {
                info!(
                    symbol = %symbol,
                    direction = %hint.direction,
                    confidence = hint.confidence,
                    "Applying override hint"
                );
                DecisionBasis::Override(hint)
            }
            None => DecisionBasis::Ensemble,
        };

        let assessment = self.ensemble.assess(&series, self.min_history, basis);
        let decision = assessment.decision;
        debug!(
            symbol = %symbol,
            bars = series.len(),
            indicators = ?assessment.indicators,
            votes = ?assessment.votes,
            direction = %decision.direction,
            confidence = decision.confidence,
            "Decision computed"
        );
        self.last_decisions.insert(symbol.clone(), decision);

        let emitted = self
            .gate
            .should_emit(symbol, decision.direction, decision.confidence, now);

        progress.publish(SymbolStatus {
            symbol: symbol.clone(),
            history_len: self.history.size(symbol),
            last_price: Some(observation.close),
            last_observed_at: Some(observation.at),
            last_decision: Some(decision),
            last_signal: self.gate.last_emitted(symbol),
            last_error: None,
            updated_at: Some(now),
        });

        if emitted {
            let alert = SignalAlert {
                symbol: symbol.clone(),
                direction: decision.direction,
                confidence: decision.confidence,
                close: observation.close,
                open: observation.open,
                observed_at: observation.at,
                emitted_at: now,
                overridden: assessment.overridden,
            };
            info!(
                symbol = %symbol,
                direction = %decision.direction,
                confidence = decision.confidence,
                price = %observation.close,
                "Signal emitted"
            );
            progress.push_alert(alert.clone());
            self.deliver(&alert).await;
        }

        CycleOutcome::Decided { decision, emitted }
    }

    /// Journal then notify. Gate state is already committed; failures here
    /// are logged and never roll it back.
    async fn deliver(&self, alert: &SignalAlert) {
        let message = alert.message();

        let journal_id = match &self.db_pool {
            Some(pool) => {
                let repo = SignalRepository::new(pool);
                let row = NewSignal {
                    symbol: alert.symbol.to_string(),
                    direction: alert.direction.to_string(),
                    confidence: alert.confidence,
                    price: alert.close,
                    observed_at: alert.observed_at,
                    emitted_at: alert.emitted_at,
                    message: message.clone(),
                    overridden: alert.overridden,
                };
                match repo.record_signal(&row).await {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(symbol = %alert.symbol, error = %e, "Failed to journal signal");
                        None
                    }
                }
            }
            None => None,
        };

        match self.notifier.send(alert).await {
            Ok(()) => {
                if let (Some(pool), Some(id)) = (&self.db_pool, journal_id) {
                    if let Err(e) = SignalRepository::new(pool).mark_delivered(id).await {
                        warn!(error = %e, "Failed to mark signal delivered");
                    }
                }
            }
            Err(e) => {
                warn!(symbol = %alert.symbol, error = %e, message = %message, "Signal delivery failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

/// Run the sniper until `progress.cancelled` is set.
pub async fn run_sniper(mut sniper: Sniper, progress: Arc<SniperProgress>) {
    info!(
        pairs = sniper.pairs.len(),
        interval = ?sniper.poll_interval,
        "Sniper loop starting"
    );
    *progress.status.write().unwrap() = SniperStatus::Polling;

    loop {
        if progress.is_cancelled() {
            info!("Sniper loop cancelled");
            break;
        }

        let outcomes = sniper.run_cycle(&progress, Utc::now()).await;
        let emitted = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CycleOutcome::Decided { emitted: true, .. }))
            .count();
        debug!(symbols = outcomes.len(), emitted, "Cycle complete");

        // Wait before next polling round
        let slice = Duration::from_millis(SLEEP_SLICE_MS).min(sniper.poll_interval);
        let mut waited = Duration::ZERO;
        while waited < sniper.poll_interval && !progress.is_cancelled() {
            tokio::time::sleep(slice).await;
            waited += slice;
        }
    }

    *progress.status.write().unwrap() = SniperStatus::Stopped;
    info!("Sniper loop stopped");
}
