//! Parsing of the RSS rate feed.
//!
//! The feed publishes one `item` per business day. Each item's description is a
//! whitespace separated run of `CODE VALUE` pairs, e.g. `USD 1.0852 GBP 0.8423`.
//! Only the last item is read.

use serde::Deserialize;
use std::collections::HashMap;
use std::num::ParseFloatError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no items found in feed")]
    Empty,

    #[error("malformed feed description: {0} tokens cannot be paired as currency/value")]
    Malformed(usize),

    #[error("invalid value '{value}' for {currency}")]
    InvalidRateValue {
        currency: String,
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("currency {0} not found in feed")]
    MissingCurrency(String),

    #[error("{0} rate workers exited without reporting")]
    Incomplete(usize),

    #[error("failed to decode feed")]
    Decode(#[from] quick_xml::DeError),
}

#[derive(Debug, Default, Deserialize)]
pub struct RssFeed {
    #[serde(default)]
    pub channel: Channel,
}

#[derive(Debug, Default, Deserialize)]
pub struct Channel {
    #[serde(rename = "item", default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub description: String,
}

impl RssFeed {
    /// Decodes an RSS document. A blank document is a feed with no items.
    pub fn from_xml(xml: &str) -> Result<Self, FeedError> {
        if xml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(quick_xml::de::from_str(xml)?)
    }

    /// Maps currency code to rate for the last item in the feed.
    ///
    /// Values are accepted as long as they parse as `f64`, so `NaN` and `inf`
    /// pass through. A repeated currency keeps its last value.
    pub fn parse_currency_rates(&self) -> Result<HashMap<String, f64>, FeedError> {
        let item = self.channel.items.last().ok_or(FeedError::Empty)?;
        parse_description(&item.description)
    }
}

pub fn parse_description(description: &str) -> Result<HashMap<String, f64>, FeedError> {
    let parts: Vec<&str> = description.split_whitespace().collect();
    if parts.len() % 2 != 0 {
        return Err(FeedError::Malformed(parts.len()));
    }

    parts
        .chunks_exact(2)
        .map(|pair| {
            let (currency, value) = (pair[0], pair[1]);
            value
                .parse::<f64>()
                .map(|v| (currency.to_string(), v))
                .map_err(|source| FeedError::InvalidRateValue {
                    currency: currency.to_string(),
                    value: value.to_string(),
                    source,
                })
        })
        .collect()
}
