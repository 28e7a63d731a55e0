use crate::core::{Rate, RateStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

type RateKey = (String, DateTime<Utc>);

/// In-memory rate store with the same insert-only semantics as the SQL store.
#[derive(Default)]
pub struct MemoryStore {
    rates: RwLock<BTreeMap<RateKey, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryStore {
    async fn save_rates(&self, rates: &[Rate]) -> StoreResult<()> {
        let mut stored = self.rates.write().await;

        let mut batch = HashSet::with_capacity(rates.len());
        for rate in rates {
            let key = (rate.currency.clone(), rate.date);
            if stored.contains_key(&key) || !batch.insert(key) {
                return Err(StoreError::DuplicateKey {
                    currency: rate.currency.clone(),
                    date: rate.date,
                });
            }
        }

        for rate in rates {
            stored.insert((rate.currency.clone(), rate.date), rate.value);
        }
        debug!("Saved {} rates", rates.len());
        Ok(())
    }

    async fn get_latest(&self) -> StoreResult<Vec<Rate>> {
        let stored = self.rates.read().await;

        // Keys sort by currency then date, so the last entry per currency wins.
        let mut latest: BTreeMap<&str, Rate> = BTreeMap::new();
        for ((currency, date), value) in stored.iter() {
            latest.insert(currency, Rate::new(currency.as_str(), *value, *date));
        }
        Ok(latest.into_values().collect())
    }

    async fn get_history(&self, currency: &str) -> StoreResult<Vec<Rate>> {
        let stored = self.rates.read().await;
        let from = (currency.to_string(), DateTime::<Utc>::MIN_UTC);
        let to = (currency.to_string(), DateTime::<Utc>::MAX_UTC);
        Ok(stored
            .range(from..=to)
            .rev()
            .map(|((c, date), value)| Rate::new(c.as_str(), *value, *date))
            .collect())
    }
}
