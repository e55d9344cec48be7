pub mod bittrex;
pub mod signer;

pub use bittrex::BittrexClient;

use std::fmt;

use anyhow::Result;
use rust_decimal::Decimal;

use crate::models::{CurrencyCode, Holding};

/// Ordered market pair as the exchange names it: `BASE-QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketPair {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
}

impl MarketPair {
    pub fn new(base: CurrencyCode, quote: CurrencyCode) -> Self {
        Self { base, quote }
    }

    pub fn flipped(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }
}

impl fmt::Display for MarketPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

/// Answer to a ticker lookup.
///
/// A pair the exchange does not list is an expected condition, so it is a
/// value rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerOutcome {
    Ask(Decimal),
    InvalidMarket,
}

/// Supplies the account's current per-asset balances.
#[async_trait::async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balances(&self) -> Result<Vec<Holding>>;

    fn name(&self) -> &str;
}

/// Supplies the current ask for a market pair.
#[async_trait::async_trait]
pub trait TickerSource: Send + Sync {
    async fn fetch_ticker(&self, pair: &MarketPair) -> Result<TickerOutcome>;

    fn name(&self) -> &str;
}
