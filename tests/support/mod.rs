#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use coinbook::exchange::{BalanceSource, MarketPair, TickerOutcome, TickerSource};
use coinbook::ingest::IngestContext;
use coinbook::live::LivePublisher;
use coinbook::market_data::FiatPriceFeed;
use coinbook::models::{CurrencyCode, Holding, Sample, Series};
use coinbook::storage::{MemorySeriesStore, SeriesStore};
use rust_decimal::Decimal;

pub fn code(value: &str) -> CurrencyCode {
    CurrencyCode::new(value).unwrap()
}

pub fn dec(value: &str) -> Decimal {
    value.parse().unwrap()
}

pub struct MockBalances {
    pub holdings: Vec<Holding>,
    pub fail: bool,
}

impl MockBalances {
    pub fn new(holdings: &[(&str, &str)]) -> Self {
        Self {
            holdings: holdings
                .iter()
                .map(|(c, b)| Holding::new(code(c), dec(b)))
                .collect(),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            holdings: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl BalanceSource for MockBalances {
    async fn fetch_balances(&self) -> Result<Vec<Holding>> {
        if self.fail {
            anyhow::bail!("balances unavailable");
        }
        Ok(self.holdings.clone())
    }

    fn name(&self) -> &str {
        "mock-balances"
    }
}

#[derive(Clone)]
pub enum TickerReply {
    Ask(&'static str),
    Fail,
    Slow(Duration, &'static str),
}

/// Ticker source answering from a table keyed by `BASE-QUOTE`. Unlisted pairs
/// are invalid markets.
#[derive(Default)]
pub struct MockTickers {
    replies: HashMap<String, TickerReply>,
    pub calls: Mutex<Vec<String>>,
}

impl MockTickers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, pair: &str, reply: TickerReply) -> Self {
        self.replies.insert(pair.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TickerSource for MockTickers {
    async fn fetch_ticker(&self, pair: &MarketPair) -> Result<TickerOutcome> {
        let key = pair.to_string();
        self.calls.lock().unwrap().push(key.clone());
        match self.replies.get(&key).cloned() {
            None => Ok(TickerOutcome::InvalidMarket),
            Some(TickerReply::Ask(ask)) => Ok(TickerOutcome::Ask(dec(ask))),
            Some(TickerReply::Fail) => anyhow::bail!("unexpected ticker body for {key}"),
            Some(TickerReply::Slow(delay, ask)) => {
                tokio::time::sleep(delay).await;
                Ok(TickerOutcome::Ask(dec(ask)))
            }
        }
    }

    fn name(&self) -> &str {
        "mock-tickers"
    }
}

pub struct MockFiat {
    pub price: Decimal,
    pub fail: bool,
}

impl MockFiat {
    pub fn new(price: &str) -> Self {
        Self {
            price: dec(price),
            fail: false,
        }
    }
}

#[async_trait]
impl FiatPriceFeed for MockFiat {
    async fn base_price_in(&self, fiat: &CurrencyCode) -> Result<Decimal> {
        if self.fail {
            anyhow::bail!("no price for {fiat}");
        }
        Ok(self.price)
    }

    fn name(&self) -> &str {
        "mock-fiat"
    }
}

/// Memory store that refuses appends for selected currencies.
#[derive(Default)]
pub struct RejectingStore {
    pub inner: MemorySeriesStore,
    pub reject: Vec<CurrencyCode>,
}

#[async_trait]
impl SeriesStore for RejectingStore {
    async fn append(&self, currency: &CurrencyCode, sample: &Sample) -> Result<()> {
        if self.reject.contains(currency) {
            anyhow::bail!("disk full");
        }
        self.inner.append(currency, sample).await
    }

    async fn list_all(&self) -> Result<Vec<CurrencyCode>> {
        self.inner.list_all().await
    }

    async fn get_one(&self, currency: &CurrencyCode) -> Result<Option<Series>> {
        self.inner.get_one(currency).await
    }
}

pub fn context(
    balances: MockBalances,
    tickers: Arc<MockTickers>,
    fiat: MockFiat,
    store: Arc<dyn SeriesStore>,
    fiat_currency: &str,
) -> IngestContext {
    IngestContext::new(
        Arc::new(balances),
        tickers,
        Arc::new(fiat),
        store,
        LivePublisher::new(16),
        code("BTC"),
        code(fiat_currency),
    )
}
