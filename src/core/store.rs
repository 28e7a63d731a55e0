//! Rate persistence abstractions

use super::rate::Rate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to database")]
    Connection(#[source] sqlx::Error),

    #[error("rate for {currency} at {date} already exists")]
    DuplicateKey {
        currency: String,
        date: DateTime<Utc>,
    },

    #[error("failed to write rates")]
    Write(#[source] sqlx::Error),

    #[error("failed to query rates")]
    Query(#[source] sqlx::Error),

    #[error("rate value {value} for {currency} cannot be stored")]
    InvalidValue { currency: String, value: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Insert-only storage of rates keyed by `(currency, date)`.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Persists the whole batch or nothing. An existing `(currency, date)`
    /// fails the batch with [`StoreError::DuplicateKey`].
    async fn save_rates(&self, rates: &[Rate]) -> StoreResult<()>;

    /// One rate per stored currency: the one with the greatest date.
    async fn get_latest(&self) -> StoreResult<Vec<Rate>>;

    /// Every rate stored for `currency`, newest first. Unknown currencies
    /// yield an empty vector.
    async fn get_history(&self, currency: &str) -> StoreResult<Vec<Rate>>;
}
