//! Composite cache service
//!
//! `TransactionCache` is the operation most callers use: plan a query,
//! serve full hits straight from the store, and otherwise fetch exactly
//! the missing sub-ranges from the provider under the refresh
//! coordinator's guard, persist them, and return the merged rows.

use std::sync::Arc;

use tracing::{debug, info};

use crate::db::Database;
use crate::error::Result;
use crate::models::{DateRange, Provider, QueryPlan, Transaction};
use crate::planner;
use crate::provider::ProviderClient;
use crate::refresh::{ConcurrencyMode, RefreshCoordinator};

/// Cached read-through access to provider transactions
#[derive(Clone)]
pub struct TransactionCache {
    db: Database,
    coordinator: RefreshCoordinator,
    client: Arc<dyn ProviderClient>,
}

impl TransactionCache {
    pub fn new(
        db: Database,
        coordinator: RefreshCoordinator,
        client: Arc<dyn ProviderClient>,
    ) -> Self {
        Self {
            db,
            coordinator,
            client,
        }
    }

    /// The underlying store, for admin and integrity operations
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The refresh coordinator, for status display and the reset hatch
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Plan a query without fetching anything
    pub fn plan_query(&self, provider: Provider, range: DateRange) -> Result<QueryPlan> {
        self.db.plan_query(provider, range)
    }

    /// Return all transactions for the range, fetching what is missing
    ///
    /// A full hit (without `force_refresh`) is served silently from the
    /// store. Otherwise the missing sub-ranges — or the whole range, when
    /// forced — are fetched under the coordinator's guard, persisted, and
    /// the touched months of the monthly index re-synced. Input and
    /// throttle errors fail fast without touching the provider; a provider
    /// failure is recorded by the coordinator and leaves the cache
    /// unchanged.
    pub async fn get_transactions(
        &self,
        provider: Provider,
        range: DateRange,
        force_refresh: bool,
        mode: ConcurrencyMode,
    ) -> Result<Vec<Transaction>> {
        let plan = self.db.plan_query(provider, range)?;

        if plan.is_full_hit() && !force_refresh {
            debug!(provider = %provider, range = %range, "serving from cache");
            return self.db.read_transactions(provider, range);
        }

        let to_fetch = if force_refresh {
            vec![range]
        } else {
            plan.missing_ranges.clone()
        };

        info!(
            provider = %provider,
            range = %range,
            status = %plan.status,
            gaps = to_fetch.len(),
            force_refresh,
            "refreshing from provider"
        );

        self.coordinator
            .run(mode, force_refresh, async {
                for gap in &to_fetch {
                    let fetched = self.client.fetch_transactions(provider, *gap).await?;
                    self.db.store_transactions(provider, &fetched, *gap)?;
                    for (year, month) in planner::months_in(*gap) {
                        self.db.sync_month(provider, year, month)?;
                    }
                }
                Ok(())
            })
            .await?;

        self.db.read_transactions(provider, range)
    }
}
