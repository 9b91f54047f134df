//! Pluggable transaction provider abstraction
//!
//! The cache core never talks to a vendor API directly; it consumes a
//! normalized `ProviderClient` seam. Concrete integrations (accounting
//! system, payment processor) live outside this crate and deal with auth,
//! rate limits, and payload shapes themselves. A `MockProvider` ships here
//! for tests and development.

mod mock;

pub use mock::MockProvider;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DateRange, NewTransaction, Provider};

/// Interface to an external transaction source
///
/// Implementations must be Send + Sync for use across async tasks. A fetch
/// returns every transaction the provider holds for the range; the cache
/// layer treats the result as authoritative for that interval.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Fetch all transactions for `provider` in the inclusive date range
    async fn fetch_transactions(
        &self,
        provider: Provider,
        range: DateRange,
    ) -> Result<Vec<NewTransaction>>;
}
