//! Resolves a held currency's value in the base market.
//!
//! The exchange lists most assets as `BASE-ASSET`, but some (stablecoins in
//! particular) only trade as `ASSET-BASE`. When the base-first pair is not a
//! market the lookup is retried once with the pair flipped and the ask is
//! inverted, since the quote direction is reversed.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::exchange::{MarketPair, TickerOutcome, TickerSource};
use crate::models::{CurrencyCode, PriceQuote};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no market for {currency} in either {pair} or {flipped}")]
    NoMarket {
        currency: CurrencyCode,
        pair: MarketPair,
        flipped: MarketPair,
    },

    #[error("ticker {pair} returned a zero ask")]
    ZeroAsk { pair: MarketPair },

    #[error("ticker lookup for {pair} failed: {source:#}")]
    Ticker {
        pair: MarketPair,
        #[source]
        source: anyhow::Error,
    },
}

pub struct PriceResolver {
    tickers: Arc<dyn TickerSource>,
}

impl PriceResolver {
    pub fn new(tickers: Arc<dyn TickerSource>) -> Self {
        Self { tickers }
    }

    /// Price of one unit of `currency` in `base_market`.
    pub async fn resolve(
        &self,
        currency: &CurrencyCode,
        base_market: &CurrencyCode,
    ) -> Result<PriceQuote, ResolveError> {
        let pair = MarketPair::new(base_market.clone(), currency.clone());

        match self.lookup(&pair).await? {
            // An asset is always worth exactly one unit of itself.
            _ if currency == base_market => Ok(PriceQuote::base_asset(currency.clone())),
            TickerOutcome::Ask(ask) => Ok(PriceQuote::quoted(currency.clone(), ask)),
            TickerOutcome::InvalidMarket => {
                let flipped = pair.flipped();
                tracing::debug!(
                    currency = %currency,
                    pair = %pair,
                    flipped = %flipped,
                    "Base-first market not listed; trying reversed pair"
                );
                match self.lookup(&flipped).await? {
                    TickerOutcome::Ask(ask) => {
                        let price = Decimal::ONE.checked_div(ask).ok_or_else(|| {
                            ResolveError::ZeroAsk {
                                pair: flipped.clone(),
                            }
                        })?;
                        Ok(PriceQuote::quoted(currency.clone(), price))
                    }
                    TickerOutcome::InvalidMarket => Err(ResolveError::NoMarket {
                        currency: currency.clone(),
                        pair,
                        flipped,
                    }),
                }
            }
        }
    }

    async fn lookup(&self, pair: &MarketPair) -> Result<TickerOutcome, ResolveError> {
        self.tickers
            .fetch_ticker(pair)
            .await
            .map_err(|source| ResolveError::Ticker {
                pair: pair.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};

    use super::*;

    #[derive(Default)]
    struct ScriptedTickers {
        answers: HashMap<String, TickerOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedTickers {
        fn with(mut self, pair: &str, outcome: TickerOutcome) -> Self {
            self.answers.insert(pair.to_string(), outcome);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl TickerSource for ScriptedTickers {
        async fn fetch_ticker(&self, pair: &MarketPair) -> Result<TickerOutcome> {
            let key = pair.to_string();
            self.calls.lock().unwrap().push(key.clone());
            self.answers
                .get(&key)
                .cloned()
                .ok_or_else(|| anyhow!("connection refused"))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn code(value: &str) -> CurrencyCode {
        CurrencyCode::new(value).unwrap()
    }

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[tokio::test]
    async fn test_base_first_ask_is_used_directly() {
        let tickers = Arc::new(
            ScriptedTickers::default().with("BTC-ETH", TickerOutcome::Ask(dec("0.031"))),
        );
        let resolver = PriceResolver::new(tickers.clone());

        let quote = resolver.resolve(&code("ETH"), &code("BTC")).await.unwrap();
        assert_eq!(quote, PriceQuote::quoted(code("ETH"), dec("0.031")));
        assert_eq!(tickers.calls(), vec!["BTC-ETH"]);
    }

    #[tokio::test]
    async fn test_base_currency_short_circuits_to_one() {
        let tickers = Arc::new(
            ScriptedTickers::default().with("BTC-BTC", TickerOutcome::InvalidMarket),
        );
        let resolver = PriceResolver::new(tickers.clone());

        let quote = resolver.resolve(&code("BTC"), &code("BTC")).await.unwrap();
        assert!(quote.is_base_asset);
        assert_eq!(quote.price_in_base, Decimal::ONE);
        assert_eq!(tickers.calls(), vec!["BTC-BTC"]);
    }

    #[tokio::test]
    async fn test_invalid_market_flips_once_and_inverts() {
        let tickers = Arc::new(
            ScriptedTickers::default()
                .with("BTC-USDT", TickerOutcome::InvalidMarket)
                .with("USDT-BTC", TickerOutcome::Ask(dec("4"))),
        );
        let resolver = PriceResolver::new(tickers.clone());

        let quote = resolver.resolve(&code("USDT"), &code("BTC")).await.unwrap();
        assert_eq!(quote, PriceQuote::quoted(code("USDT"), dec("0.25")));
        assert_eq!(tickers.calls(), vec!["BTC-USDT", "USDT-BTC"]);
    }

    #[tokio::test]
    async fn test_second_invalid_market_is_terminal() {
        let tickers = Arc::new(
            ScriptedTickers::default()
                .with("BTC-XYZ", TickerOutcome::InvalidMarket)
                .with("XYZ-BTC", TickerOutcome::InvalidMarket),
        );
        let resolver = PriceResolver::new(tickers.clone());

        let err = resolver.resolve(&code("XYZ"), &code("BTC")).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoMarket { .. }));
        assert_eq!(tickers.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let tickers = Arc::new(ScriptedTickers::default());
        let resolver = PriceResolver::new(tickers.clone());

        let err = resolver.resolve(&code("ETH"), &code("BTC")).await.unwrap_err();
        assert!(matches!(err, ResolveError::Ticker { .. }));
        assert_eq!(tickers.calls(), vec!["BTC-ETH"]);
    }

    #[tokio::test]
    async fn test_zero_ask_on_flip_is_an_error() {
        let tickers = Arc::new(
            ScriptedTickers::default()
                .with("BTC-USDT", TickerOutcome::InvalidMarket)
                .with("USDT-BTC", TickerOutcome::Ask(Decimal::ZERO)),
        );
        let resolver = PriceResolver::new(tickers);

        let err = resolver.resolve(&code("USDT"), &code("BTC")).await.unwrap_err();
        assert!(matches!(err, ResolveError::ZeroAsk { .. }));
    }
}
