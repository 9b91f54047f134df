//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// External transaction providers
///
/// `Books` is the accounting system, `Payments` the payment processor.
/// Each provider's transactions are cached independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Books,
    Payments,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Books => "books",
            Self::Payments => "payments",
        }
    }

    /// All known providers, in stable order
    pub fn all() -> [Provider; 2] {
        [Self::Books, Self::Payments]
    }
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "books" | "accounting" => Ok(Self::Books),
            "payments" | "processor" => Ok(Self::Payments),
            _ => Err(Error::UnknownProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of a transaction; amounts are always positive magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A cached financial transaction
///
/// Keyed by `(provider, id)`; `year`/`month` are denormalized from `date`
/// for fast month grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Provider-assigned stable identifier
    pub id: String,
    pub provider: Provider,
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    /// Positive magnitude; direction conveyed by `kind`
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A transaction as returned by a provider, before persistence
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl NewTransaction {
    pub fn new(id: impl Into<String>, date: NaiveDate, amount: f64, kind: TransactionKind) -> Self {
        Self {
            id: id.into(),
            date,
            amount,
            kind,
            category: None,
            description: None,
        }
    }
}

/// An inclusive calendar-day interval
///
/// `start == end` is a valid single-day range. Construction rejects
/// inverted ranges rather than swapping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidRange(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Number of days covered (inclusive, so at least 1)
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn intersects(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            Some(DateRange { start, end })
        } else {
            None
        }
    }

    /// True when the two ranges overlap or touch (no gap day between them)
    pub fn touches(&self, other: &DateRange) -> bool {
        let gap_ok = |a: NaiveDate, b: NaiveDate| match a.succ_opt() {
            Some(next) => next >= b,
            None => false,
        };
        if self.intersects(other) {
            return true;
        }
        if self.end < other.start {
            gap_ok(self.end, other.start)
        } else {
            gap_ok(other.end, self.start)
        }
    }

    /// Smallest range covering both (meaningful when `touches` holds)
    pub fn union_span(&self, other: &DateRange) -> DateRange {
        DateRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A stored record of confirmed cache coverage for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSegment {
    pub id: i64,
    pub provider: Provider,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl CacheSegment {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

/// Completeness claim of a monthly cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthStatus {
    /// The whole calendar month is covered by cache segments
    Complete,
    /// Some rows are cached but coverage has gaps
    Partial,
    /// No coverage judgement has been made
    Unknown,
}

impl MonthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for MonthStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "complete" => Ok(Self::Complete),
            "partial" => Ok(Self::Partial),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown month status: {}", s)),
        }
    }
}

impl std::fmt::Display for MonthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the month-granular cache index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyCacheEntry {
    pub provider: Provider,
    pub year: i32,
    pub month: u32,
    /// Row count in the transaction store at last sync
    pub transaction_count: i64,
    pub status: MonthStatus,
    pub updated_at: DateTime<Utc>,
}

/// Verdict of a cache coverage query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheVerdict {
    FullHit,
    PartialHit,
    Miss,
}

impl std::fmt::Display for CacheVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FullHit => "full_hit",
            Self::PartialHit => "partial_hit",
            Self::Miss => "miss",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of planning a query against cached coverage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub status: CacheVerdict,
    /// Parts of the requested range already covered, disjoint and sorted
    pub cached_ranges: Vec<DateRange>,
    /// Parts that must be fetched, disjoint and sorted
    pub missing_ranges: Vec<DateRange>,
}

impl QueryPlan {
    pub fn is_full_hit(&self) -> bool {
        self.status == CacheVerdict::FullHit
    }
}
