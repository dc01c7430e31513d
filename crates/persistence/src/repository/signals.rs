//! Signal journal — one row per signal the gate emitted

use crate::DbResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

/// A signal about to be journaled
#[derive(Debug, Clone)]
pub struct NewSignal {
    pub symbol: String,
    pub direction: String,
    pub confidence: f64,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
    pub emitted_at: DateTime<Utc>,
    pub message: String,
    pub overridden: bool,
}

impl NewSignal {
    /// Stable identity: symbol, direction and emission instant
    pub fn signal_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.symbol.as_bytes());
        hasher.update(b"|");
        hasher.update(self.direction.as_bytes());
        hasher.update(b"|");
        hasher.update(self.emitted_at.timestamp_millis().to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A persisted signal row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SignalRecord {
    pub id: i64,
    pub signal_hash: String,
    pub symbol: String,
    pub direction: String,
    pub confidence: f64,
    pub price: String,
    pub observed_at: i64,
    pub emitted_at: i64,
    pub message: String,
    pub overridden: i64,
    pub delivered: i64,
    pub created_at: Option<i64>,
}

impl SignalRecord {
    pub fn price_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.price).ok()
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered != 0
    }
}

/// Repository for the signal journal
pub struct SignalRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SignalRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a signal (INSERT OR IGNORE by signal_hash).
    /// Returns the new row id, or None if the signal was already journaled.
    pub async fn record_signal(&self, signal: &NewSignal) -> DbResult<Option<i64>> {
        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO emitted_signals
                (signal_hash, symbol, direction, confidence, price, observed_at,
                 emitted_at, message, overridden)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(signal.signal_hash())
        .bind(&signal.symbol)
        .bind(&signal.direction)
        .bind(signal.confidence)
        .bind(signal.price.to_string())
        .bind(signal.observed_at.timestamp())
        .bind(signal.emitted_at.timestamp())
        .bind(&signal.message)
        .bind(i64::from(signal.overridden))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    pub async fn mark_delivered(&self, id: i64) -> DbResult<()> {
        sqlx::query("UPDATE emitted_signals SET delivered = 1 WHERE id = ?1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Most recent signals first, optionally for one symbol
    pub async fn recent_signals(
        &self,
        symbol: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<SignalRecord>> {
        let records = match symbol {
            Some(symbol) => {
                sqlx::query_as::<_, SignalRecord>(
                    r#"SELECT * FROM emitted_signals
                       WHERE symbol = ?1
                       ORDER BY emitted_at DESC, id DESC LIMIT ?2"#,
                )
                .bind(symbol)
                .bind(limit)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SignalRecord>(
                    "SELECT * FROM emitted_signals ORDER BY emitted_at DESC, id DESC LIMIT ?1",
                )
                .bind(limit)
                .fetch_all(self.pool)
                .await?
            }
        };
        Ok(records)
    }

    pub async fn undelivered_count(&self) -> DbResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM emitted_signals WHERE delivered = 0")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
