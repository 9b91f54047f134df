//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `transactions` - Transaction store (cached provider rows, write path)
//! - `segments` - Cache segment store (range-granular coverage records)
//! - `monthly` - Monthly cache index (month-granular existence index)
//! - `integrity` - Admin operations (verify, repair, diagnose, clear, stats)

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod integrity;
mod monthly;
mod segments;
mod transactions;

pub use integrity::{ClearReport, DetailedStats, DiagnoseReport, IntegrityReport, MissingMonth, ProviderStats};
pub use monthly::SyncReport;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool at the given path
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because every
    /// pooled connection must see the same database, and `:memory:` gives
    /// each connection its own.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!(
            "{}/tally_test_{}_{}.db",
            std::env::temp_dir().display(),
            std::process::id(),
            id
        );

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            -- Note: creates -wal and -shm sidecar files alongside the database
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory (faster for complex queries)
            PRAGMA temp_store = MEMORY;

            -- Cached transactions (source of truth for everything derived)
            CREATE TABLE IF NOT EXISTS transactions (
                id TEXT NOT NULL,                           -- provider-assigned identifier
                provider TEXT NOT NULL,                     -- books, payments
                date DATE NOT NULL,
                year INTEGER NOT NULL,                      -- denormalized from date
                month INTEGER NOT NULL,                     -- denormalized from date
                amount REAL NOT NULL,                       -- positive magnitude
                kind TEXT NOT NULL,                         -- income, expense
                category TEXT,
                description TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (provider, id)
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_provider_date ON transactions(provider, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_provider_month ON transactions(provider, year, month);

            -- Cache segments: confirmed fully-fetched date intervals per provider.
            -- Stored disjoint; record_segment merges overlapping/adjacent rows.
            CREATE TABLE IF NOT EXISTS cache_segments (
                id INTEGER PRIMARY KEY,
                provider TEXT NOT NULL,
                start_date DATE NOT NULL,
                end_date DATE NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_segments_provider_start ON cache_segments(provider, start_date);

            -- Monthly cache index: month-granular existence/consistency index.
            -- Derived from transactions; allowed to drift until synced.
            CREATE TABLE IF NOT EXISTS monthly_cache (
                provider TEXT NOT NULL,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                transaction_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'unknown',     -- complete, partial, unknown
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (provider, year, month)
            );
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
