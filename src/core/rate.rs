//! Exchange rate records and the capability to produce them

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single observation of a currency's value at a point in time.
///
/// `(currency, date)` identifies a rate; once stored it is never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub currency: String,
    pub value: f64,
    pub date: DateTime<Utc>,
}

impl Rate {
    pub fn new(currency: impl Into<String>, value: f64, date: DateTime<Utc>) -> Self {
        Self {
            currency: currency.into(),
            value,
            date,
        }
    }
}

/// Source of a batch of rates sharing one as-of timestamp.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self) -> Result<Vec<Rate>>;
}
