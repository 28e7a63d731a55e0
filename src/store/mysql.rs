use crate::core::{Rate, RateStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::{debug, info};

const VALUE_SCALE: u32 = 8;

const CREATE_RATES: &str = "
    CREATE TABLE IF NOT EXISTS rates (
        currency VARCHAR(10) NOT NULL,
        value DECIMAL(18,8) NOT NULL,
        date DATETIME(6) NOT NULL,
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

type RateRow = (String, Decimal, DateTime<Utc>);

/// MySQL rate store. Values are `DECIMAL(18,8)` and dates `DATETIME(6)` in UTC.
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Connects to `url` and makes sure the `rates` table exists.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(StoreError::Connection)?;
        info!("Connected to MySQL");

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

fn to_decimal(rate: &Rate) -> StoreResult<Decimal> {
    Decimal::from_f64(rate.value)
        .map(|d| d.round_dp(VALUE_SCALE))
        .ok_or_else(|| StoreError::InvalidValue {
            currency: rate.currency.clone(),
            value: rate.value.to_string(),
        })
}

fn to_rate((currency, value, date): RateRow) -> StoreResult<Rate> {
    let Some(value_f64) = value.to_f64() else {
        return Err(StoreError::InvalidValue {
            currency,
            value: value.to_string(),
        });
    };
    Ok(Rate::new(currency, value_f64, date))
}

#[async_trait]
impl RateStore for MySqlStore {
    async fn save_rates(&self, rates: &[Rate]) -> StoreResult<()> {
        let values = rates.iter().map(to_decimal).collect::<StoreResult<Vec<_>>>()?;

        let mut tx = self.pool.begin().await.map_err(StoreError::Write)?;
        for (rate, value) in rates.iter().zip(values) {
            sqlx::query(INSERT_RATE)
                .bind(rate.currency.as_str())
                .bind(value)
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
        sqlx::query_as::<_, RateRow>(SELECT_LATEST)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?
            .into_iter()
            .map(to_rate)
            .collect()
    }

    async fn get_history(&self, currency: &str) -> StoreResult<Vec<Rate>> {
        sqlx::query_as::<_, RateRow>(SELECT_HISTORY)
            .bind(currency)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?
            .into_iter()
            .map(to_rate)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(micros: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 7, 14, 0, 0).unwrap() + Duration::microseconds(micros)
    }

    #[test]
    fn test_value_is_rounded_to_column_scale() {
        let value = to_decimal(&Rate::new("JPY", 163.123456789, at(0))).unwrap();
        assert_eq!(value, Decimal::new(16_312_345_679, 8));

        let value = to_decimal(&Rate::new("USD", 1.0852, at(0))).unwrap();
        assert_eq!(value, Decimal::new(10_852, 4));
    }

    #[test]
    fn test_non_finite_value_is_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = to_decimal(&Rate::new("USD", bad, at(0))).unwrap_err();
            assert!(matches!(err, StoreError::InvalidValue { currency, .. } if currency == "USD"));
        }
    }

    #[test]
    fn test_row_to_rate() {
        let rate = to_rate(("GBP".to_string(), Decimal::new(84_230_000, 8), at(123_456))).unwrap();
        assert_eq!(rate, Rate::new("GBP", 0.8423, at(123_456)));
    }

    /// Runs against a real server when `EXCHRATES_TEST_MYSQL_URL` is set.
    #[tokio::test]
    async fn test_round_trip_against_server() {
        let Ok(url) = std::env::var("EXCHRATES_TEST_MYSQL_URL") else {
            return;
        };
        let store = MySqlStore::connect(&url, 1).await.unwrap();
        sqlx::query("DELETE FROM rates WHERE currency IN ('ZZA', 'ZZB')")
            .execute(&store.pool)
            .await
            .unwrap();

        store
            .save_rates(&[Rate::new("ZZA", 1.03, at(0)), Rate::new("ZZB", 0.83, at(0))])
            .await
            .unwrap();
        store
            .save_rates(&[Rate::new("ZZA", 1.0852, at(123_456))])
            .await
            .unwrap();

        let history = store.get_history("ZZA").await.unwrap();
        let dates: Vec<_> = history.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![at(123_456), at(0)]);
        assert!((history[0].value - 1.0852).abs() < 1e-9);

        let result = store
            .save_rates(&[Rate::new("ZZB", 0.9, at(5)), Rate::new("ZZA", 2.0, at(0))])
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateKey { .. })));
        assert_eq!(store.get_history("ZZB").await.unwrap().len(), 1);

        store.close().await;
    }
}
