//! Database schema definitions

/// SQL to create all tables
/// NOTE: prices stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Emitted signals (journal, append-only apart from the delivered flag)
CREATE TABLE IF NOT EXISTS emitted_signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    signal_hash TEXT NOT NULL UNIQUE,
    symbol TEXT NOT NULL,
    direction TEXT NOT NULL,
    confidence REAL NOT NULL,
    price TEXT NOT NULL,
    observed_at INTEGER NOT NULL,
    emitted_at INTEGER NOT NULL,
    message TEXT NOT NULL,
    overridden INTEGER NOT NULL DEFAULT 0,
    delivered INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_signals_symbol ON emitted_signals(symbol, emitted_at DESC);
CREATE INDEX IF NOT EXISTS idx_signals_delivered ON emitted_signals(delivered)
"#;
