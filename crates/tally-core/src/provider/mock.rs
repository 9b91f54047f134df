//! Mock provider for testing
//!
//! Serves canned transactions filtered to the requested range, counts
//! fetches, and can be switched into a failing mode. Useful for unit tests
//! and development without live provider credentials.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{DateRange, NewTransaction, Provider};

use super::ProviderClient;

/// Mock transaction provider for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    /// Canned rows per provider; a fetch returns the ones in range
    data: Arc<Mutex<Vec<(Provider, NewTransaction)>>>,
    /// Total fetch calls across all providers
    fetch_count: Arc<AtomicU32>,
    /// When set, every fetch fails
    failing: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed canned transactions for a provider
    pub async fn seed(&self, provider: Provider, transactions: Vec<NewTransaction>) {
        let mut data = self.data.lock().await;
        for t in transactions {
            data.push((provider, t));
        }
    }

    /// Make every subsequent fetch fail (or recover)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many fetches have been issued
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn fetch_transactions(
        &self,
        provider: Provider,
        range: DateRange,
    ) -> Result<Vec<NewTransaction>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Provider(format!(
                "mock fetch failure for {} {}",
                provider, range
            )));
        }

        let data = self.data.lock().await;
        Ok(data
            .iter()
            .filter(|(p, t)| *p == provider && range.contains(t.date))
            .map(|(_, t)| t.clone())
            .collect())
    }
}
