use super::rss::{FeedError, RssFeed};
use crate::core::{Rate, RateProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub struct RssProvider {
    url: String,
    client: reqwest::Client,
}

impl RssProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("exchrates/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Downloads the feed and parses the latest item into currency -> value.
    pub async fn fetch_currency_rates(&self) -> Result<HashMap<String, f64>> {
        debug!("Requesting rate feed from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to fetch rate feed from {}", self.url))?;

        let body = response
            .text()
            .await
            .context("Failed to read rate feed body")?;

        let feed = RssFeed::from_xml(&body)?;
        let rates = feed.parse_currency_rates()?;
        debug!("Parsed {} currencies from feed", rates.len());
        Ok(rates)
    }
}

#[async_trait]
impl RateProvider for RssProvider {
    async fn fetch_rates(&self) -> Result<Vec<Rate>> {
        let rates = self.fetch_currency_rates().await?;
        // One timestamp for the whole batch, at the precision the store keeps.
        let as_of = Utc::now().trunc_subsecs(6);
        Ok(resolve_concurrently(Arc::new(rates), as_of, lookup_rate).await?)
    }
}

fn lookup_rate(
    rates: &HashMap<String, f64>,
    currency: &str,
    as_of: DateTime<Utc>,
) -> Result<Rate, FeedError> {
    rates
        .get(currency)
        .map(|value| Rate::new(currency, *value, as_of))
        .ok_or_else(|| FeedError::MissingCurrency(currency.to_string()))
}

/// Runs `resolve` for every currency on its own task and gathers the results
/// through a channel sized to the number of currencies.
///
/// The first error is returned as soon as it is received. Tasks still running
/// at that point are not aborted; whatever they send afterwards is dropped.
pub async fn resolve_concurrently<F>(
    rates: Arc<HashMap<String, f64>>,
    as_of: DateTime<Utc>,
    resolve: F,
) -> Result<Vec<Rate>, FeedError>
where
    F: Fn(&HashMap<String, f64>, &str, DateTime<Utc>) -> Result<Rate, FeedError>
        + Clone
        + Send
        + 'static,
{
    let expected = rates.len();
    let (tx, mut rx) = mpsc::channel(expected.max(1));

    for currency in rates.keys().cloned() {
        let tx = tx.clone();
        let rates = Arc::clone(&rates);
        let resolve = resolve.clone();
        tokio::spawn(async move {
            let result = resolve(&rates, &currency, as_of);
            // Receiver is gone once another task has failed.
            let _ = tx.send(result).await;
        });
    }
    drop(tx);

    let mut resolved = Vec::with_capacity(expected);
    while let Some(result) = rx.recv().await {
        resolved.push(result?);
    }

    if resolved.len() != expected {
        return Err(FeedError::Incomplete(expected - resolved.len()));
    }
    Ok(resolved)
}
