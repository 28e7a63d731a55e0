use crate::core::{Rate, RateStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{debug, info};

const CREATE_RATES: &str = "
    CREATE TABLE IF NOT EXISTS rates (
        currency VARCHAR(10) NOT NULL,
        value REAL NOT NULL,
        date TEXT NOT NULL,
        PRIMARY KEY (currency, date)
    )";

const INSERT_RATE: &str = "INSERT INTO rates (currency, value, date) VALUES (?, ?, ?)";

// Ties on (currency, MAX(date)) cannot occur while the primary key holds;
// if they did, every tied row would be returned in engine order.
const SELECT_LATEST: &str = "
    SELECT r.currency, r.value, r.date
    FROM rates r
    JOIN (
        SELECT currency, MAX(date) AS latest_date
        FROM rates
        GROUP BY currency
    ) t
    ON r.currency = t.currency AND r.date = t.latest_date
    ORDER BY r.currency";

const SELECT_HISTORY: &str = "
    SELECT currency, value, date
    FROM rates
    WHERE currency = ?
    ORDER BY date DESC";

type RateRow = (String, f64, DateTime<Utc>);

/// SQLite rate store for local and single-node use. Dates are RFC 3339 text in
/// UTC, which sorts chronologically.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to `url` and makes sure the `rates` table exists.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(StoreError::Connection)?;
        info!("Connected to SQLite");

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(CREATE_RATES)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Write)?;
        debug!("Rates table ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_rate((currency, value, date): RateRow) -> Rate {
    Rate::new(currency, value, date)
}

#[async_trait]
impl RateStore for SqliteStore {
    async fn save_rates(&self, rates: &[Rate]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Write)?;

        for rate in rates {
            sqlx::query(INSERT_RATE)
                .bind(rate.currency.as_str())
                .bind(rate.value)
                .bind(rate.date)
                .execute(&mut *tx)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                        StoreError::DuplicateKey {
                            currency: rate.currency.clone(),
                            date: rate.date,
                        }
                    }
                    e => StoreError::Write(e),
                })?;
            // An early return drops `tx`, which rolls it back.
        }

        tx.commit().await.map_err(StoreError::Write)?;
        debug!("Saved {} rates", rates.len());
        Ok(())
    }

    async fn get_latest(&self) -> StoreResult<Vec<Rate>> {
        let rows = sqlx::query_as::<_, RateRow>(SELECT_LATEST)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(rows.into_iter().map(to_rate).collect())
    }

    async fn get_history(&self, currency: &str) -> StoreResult<Vec<Rate>> {
        let rows = sqlx::query_as::<_, RateRow>(SELECT_HISTORY)
            .bind(currency)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(rows.into_iter().map(to_rate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    async fn memory_store() -> SqliteStore {
        // Every SQLite in-memory connection is its own database.
        SqliteStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn at(day: u32, micros: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 14, 0, 0).unwrap() + Duration::microseconds(micros)
    }

    #[tokio::test]
    async fn test_save_and_get_history_newest_first() {
        let store = memory_store().await;

        store
            .save_rates(&[Rate::new("USD", 1.03, at(6, 0)), Rate::new("GBP", 0.83, at(6, 0))])
            .await
            .unwrap();
        store
            .save_rates(&[
                Rate::new("USD", 1.0852, at(7, 123_456)),
                Rate::new("GBP", 0.8423, at(7, 123_456)),
            ])
            .await
            .unwrap();

        let history = store.get_history("USD").await.unwrap();
        assert_eq!(
            history,
            vec![
                Rate::new("USD", 1.0852, at(7, 123_456)),
                Rate::new("USD", 1.03, at(6, 0)),
            ]
        );
        assert!(history.windows(2).all(|w| w[0].date >= w[1].date));
    }

    #[tokio::test]
    async fn test_subsecond_dates_keep_chronological_order() {
        let store = memory_store().await;

        for micros in [500_000, 0, 123_456, 999_999, 100_001] {
            store
                .save_rates(&[Rate::new("USD", micros as f64, at(7, micros))])
                .await
                .unwrap();
        }

        let dates: Vec<_> = store
            .get_history("USD")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(
            dates,
            vec![at(7, 999_999), at(7, 500_000), at(7, 123_456), at(7, 100_001), at(7, 0)]
        );
        assert_eq!(store.get_latest().await.unwrap()[0].date, at(7, 999_999));
    }

    #[tokio::test]
    async fn test_get_latest_one_per_currency() {
        let store = memory_store().await;

        store
            .save_rates(&[Rate::new("USD", 1.03, at(6, 0)), Rate::new("GBP", 0.83, at(6, 0))])
            .await
            .unwrap();
        store
            .save_rates(&[Rate::new("USD", 1.0852, at(7, 1))])
            .await
            .unwrap();

        let latest = store.get_latest().await.unwrap();
        assert_eq!(
            latest,
            vec![Rate::new("GBP", 0.83, at(6, 0)), Rate::new("USD", 1.0852, at(7, 1))]
        );
    }

    #[tokio::test]
    async fn test_duplicate_key_rolls_back_batch() {
        let store = memory_store().await;
        store
            .save_rates(&[Rate::new("USD", 1.03, at(6, 0))])
            .await
            .unwrap();

        let err = store
            .save_rates(&[
                Rate::new("GBP", 0.83, at(6, 0)),
                Rate::new("USD", 9.99, at(6, 0)),
            ])
            .await
            .unwrap_err();
        match err {
            StoreError::DuplicateKey { currency, date } => {
                assert_eq!(currency, "USD");
                assert_eq!(date, at(6, 0));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // First record untouched, GBP from the failed batch not persisted.
        assert_eq!(
            store.get_history("USD").await.unwrap(),
            vec![Rate::new("USD", 1.03, at(6, 0))]
        );
        assert!(store.get_history("GBP").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_currency_and_empty_store() {
        let store = memory_store().await;

        assert!(store.get_history("XXX").await.unwrap().is_empty());
        assert!(store.get_latest().await.unwrap().is_empty());
        store.save_rates(&[]).await.unwrap();
        assert!(store.get_latest().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_database_persists_across_connections() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("rates.db").display());

        let store = SqliteStore::connect(&url, 2).await.unwrap();
        store
            .save_rates(&[Rate::new("USD", 1.0852, at(7, 0))])
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteStore::connect(&url, 2).await.unwrap();
        assert_eq!(
            reopened.get_latest().await.unwrap(),
            vec![Rate::new("USD", 1.0852, at(7, 0))]
        );
    }

    #[tokio::test]
    async fn test_connection_failure() {
        let result = SqliteStore::connect("sqlite:///nonexistent-dir/sub/rates.db?mode=ro", 1).await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }
}
