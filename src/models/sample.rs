use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CurrencyCode, PriceQuote};

/// One persisted observation of a held asset.
///
/// Decimal fields serialize as strings to avoid floating point drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Whole minutes since the Unix epoch of the poll tick that produced it.
    pub time: i64,
    pub balance: Decimal,
    /// Absent for the base market's own currency, where it is always 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_base: Option<Decimal>,
    pub price_fiat: Decimal,
}

impl Sample {
    pub fn new(time: i64, balance: Decimal, quote: &PriceQuote, price_fiat: Decimal) -> Self {
        Self {
            time,
            balance,
            price_base: (!quote.is_base_asset).then_some(quote.price_in_base),
            price_fiat,
        }
    }
}

/// Append-only history of samples for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    #[serde(rename = "_id")]
    pub id: CurrencyCode,
    pub values: Vec<Sample>,
}

impl Series {
    pub fn new(id: CurrencyCode) -> Self {
        Self {
            id,
            values: Vec::new(),
        }
    }

    pub fn last(&self) -> Option<&Sample> {
        self.values.last()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("live event must carry exactly one sample, got {0}")]
pub struct LiveEventError(usize);

/// Broadcast payload for a freshly appended sample.
///
/// Shaped like a single-element [`Series`] so clients can merge it with data
/// fetched from the read API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Series")]
pub struct LiveEvent {
    #[serde(rename = "_id")]
    currency: CurrencyCode,
    values: Vec<Sample>,
}

impl LiveEvent {
    pub fn new(currency: CurrencyCode, sample: Sample) -> Self {
        Self {
            currency,
            values: vec![sample],
        }
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    pub fn sample(&self) -> &Sample {
        &self.values[0]
    }
}

impl TryFrom<Series> for LiveEvent {
    type Error = LiveEventError;

    fn try_from(series: Series) -> Result<Self, Self::Error> {
        let Series { id, mut values } = series;
        if values.len() != 1 {
            return Err(LiveEventError(values.len()));
        }
        Ok(Self::new(id, values.remove(0)))
    }
}
