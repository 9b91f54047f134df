//! Tally Core Library
//!
//! Shared functionality for the Tally transaction cache:
//! - Database access and migrations (transactions, segments, monthly index)
//! - Cache segment coverage bookkeeping with merge/split semantics
//! - Pure query planning (full hit / partial hit / miss, missing ranges)
//! - Refresh coordination with circuit-breaker rate limiting
//! - Pluggable provider backends behind an async seam
//! - Admin/integrity operations (verify, repair, diagnose, sync, clear)

pub mod cache;
pub mod db;
pub mod error;
pub mod models;
pub mod planner;
pub mod provider;
pub mod refresh;

pub use cache::TransactionCache;
pub use db::{
    ClearReport, Database, DetailedStats, DiagnoseReport, IntegrityReport, MissingMonth,
    ProviderStats, SyncReport,
};
pub use error::{Error, Result};
pub use models::{
    CacheSegment, CacheVerdict, DateRange, MonthStatus, MonthlyCacheEntry, NewTransaction,
    Provider, QueryPlan, Transaction, TransactionKind,
};
pub use provider::{MockProvider, ProviderClient};
pub use refresh::{
    ConcurrencyMode, RefreshConfig, RefreshCoordinator, RefreshDecision, RefreshStats,
};
