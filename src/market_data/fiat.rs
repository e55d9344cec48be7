use std::sync::Arc;

use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::CurrencyCode;

/// External feed quoting the base market asset in a fiat currency.
#[async_trait::async_trait]
pub trait FiatPriceFeed: Send + Sync {
    /// Current price of one unit of the base asset in `fiat`.
    async fn base_price_in(&self, fiat: &CurrencyCode) -> Result<Decimal>;

    fn name(&self) -> &str;
}

/// Round a fiat amount to exactly two decimal places, halves away from zero.
///
/// The result always carries a scale of 2, so `1000` renders as `1000.00`.
pub fn round_fiat(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

pub struct FiatConverter {
    feed: Arc<dyn FiatPriceFeed>,
}

impl FiatConverter {
    pub fn new(feed: Arc<dyn FiatPriceFeed>) -> Self {
        Self { feed }
    }

    /// Fiat value of `balance` units of an asset worth `price_in_base`.
    pub async fn to_fiat(
        &self,
        price_in_base: Decimal,
        balance: Decimal,
        fiat: &CurrencyCode,
    ) -> Result<Decimal> {
        let base_price = self.feed.base_price_in(fiat).await?;
        let value = price_in_base
            .checked_mul(base_price)
            .and_then(|v| v.checked_mul(balance))
            .with_context(|| {
                format!(
                    "Fiat value overflows: {price_in_base} x {base_price} {fiat} x balance {balance}"
                )
            })?;
        Ok(round_fiat(value))
    }
}
