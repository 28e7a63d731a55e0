use crate::core::{Rate, RateProvider, RateStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Wires a rate provider to a rate store.
#[derive(Clone)]
pub struct RateService {
    provider: Arc<dyn RateProvider>,
    store: Arc<dyn RateStore>,
}

impl RateService {
    pub fn new(provider: Arc<dyn RateProvider>, store: Arc<dyn RateStore>) -> Self {
        Self { provider, store }
    }

    /// Fetches one batch and stores it, returning what was saved.
    pub async fn fetch_and_save(&self) -> Result<Vec<Rate>> {
        let rates = self
            .provider
            .fetch_rates()
            .await
            .context("Failed to fetch rates")?;
        self.store
            .save_rates(&rates)
            .await
            .context("Failed to save rates")?;
        info!(count = rates.len(), "Rates fetched and saved");
        Ok(rates)
    }

    pub async fn get_latest(&self) -> Result<Vec<Rate>> {
        Ok(self.store.get_latest().await?)
    }

    pub async fn get_history(&self, currency: &str) -> Result<Vec<Rate>> {
        Ok(self.store.get_history(currency).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StoreError;
    use crate::store::MemoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockProvider {
        date: DateTime<Utc>,
        fail: bool,
        call_count: AtomicUsize,
    }

    impl MockProvider {
        fn new(fail: bool) -> Self {
            Self {
                date: Utc.with_ymd_and_hms(2025, 1, 7, 14, 0, 0).unwrap(),
                fail,
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RateProvider for MockProvider {
        async fn fetch_rates(&self) -> Result<Vec<Rate>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("feed unreachable"));
            }
            Ok(vec![
                Rate::new("USD", 1.0852, self.date),
                Rate::new("GBP", 0.8423, self.date),
            ])
        }
    }

    #[tokio::test]
    async fn test_fetch_and_save() {
        let store = Arc::new(MemoryStore::new());
        let service = RateService::new(Arc::new(MockProvider::new(false)), store.clone());

        let saved = service.fetch_and_save().await.unwrap();
        assert_eq!(saved.len(), 2);

        let latest = service.get_latest().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(service.get_history("USD").await.unwrap().len(), 1);
        assert!(service.get_history("JPY").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_saves_nothing() {
        let store = Arc::new(MemoryStore::new());
        let service = RateService::new(Arc::new(MockProvider::new(true)), store.clone());

        assert!(service.fetch_and_save().await.is_err());
        assert!(store.get_latest().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_batch_is_rejected() {
        let provider = Arc::new(MockProvider::new(false));
        let service = RateService::new(provider.clone(), Arc::new(MemoryStore::new()));

        service.fetch_and_save().await.unwrap();
        let err = service.fetch_and_save().await.unwrap_err();

        assert_eq!(provider.call_count.load(Ordering::SeqCst), 2);
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::DuplicateKey { .. })
        ));
        assert_eq!(service.get_history("GBP").await.unwrap().len(), 1);
    }
}
