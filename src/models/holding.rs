use rust_decimal::Decimal;

use super::CurrencyCode;

/// Quantity of one asset held on the exchange at poll time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub currency: CurrencyCode,
    pub balance: Decimal,
}

impl Holding {
    pub fn new(currency: CurrencyCode, balance: Decimal) -> Self {
        Self { currency, balance }
    }
}

/// Value of one unit of `currency` expressed in the base market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub currency: CurrencyCode,
    pub price_in_base: Decimal,
    /// True only for the base market's own currency, priced at exactly 1.
    pub is_base_asset: bool,
}

impl PriceQuote {
    pub fn base_asset(currency: CurrencyCode) -> Self {
        Self {
            currency,
            price_in_base: Decimal::ONE,
            is_base_asset: true,
        }
    }

    pub fn quoted(currency: CurrencyCode, price_in_base: Decimal) -> Self {
        Self {
            currency,
            price_in_base,
            is_base_asset: false,
        }
    }
}
