//! One poll cycle: balances -> per-currency price resolution -> fiat value ->
//! append -> publish.
//!
//! Each held currency is processed concurrently and independently; a failure
//! for one currency only drops that currency's sample for the cycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;

use crate::clock::epoch_minutes;
use crate::exchange::{BalanceSource, TickerSource};
use crate::live::LivePublisher;
use crate::market_data::{FiatConverter, FiatPriceFeed, PriceResolver, ResolveError};
use crate::models::{CurrencyCode, Holding, LiveEvent, Sample};
use crate::storage::SeriesStore;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Step of a currency's processing that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ticker,
    Fiat,
    Store,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Ticker => "ticker",
            Stage::Fiat => "fiat",
            Stage::Store => "store",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CurrencyFailure {
    #[error("{stage} call timed out after {limit:?}")]
    Timeout { stage: Stage, limit: Duration },

    #[error(transparent)]
    Price(#[from] ResolveError),

    #[error("fiat conversion failed: {0:#}")]
    Fiat(#[source] anyhow::Error),

    #[error("append failed: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl CurrencyFailure {
    pub fn stage(&self) -> Stage {
        match self {
            CurrencyFailure::Timeout { stage, .. } => *stage,
            CurrencyFailure::Price(_) => Stage::Ticker,
            CurrencyFailure::Fiat(_) => Stage::Fiat,
            CurrencyFailure::Store(_) => Stage::Store,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedCurrency {
    pub currency: CurrencyCode,
    pub stage: Stage,
    pub error: String,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub tick: DateTime<Utc>,
    pub holdings: usize,
    pub appended: Vec<CurrencyCode>,
    pub failed: Vec<FailedCurrency>,
}

/// Everything a poll cycle needs, constructed once and shared by every cycle.
pub struct IngestContext {
    balances: Arc<dyn BalanceSource>,
    resolver: PriceResolver,
    fiat: FiatConverter,
    store: Arc<dyn SeriesStore>,
    publisher: LivePublisher,
    base_market: CurrencyCode,
    fiat_currency: CurrencyCode,
    call_timeout: Duration,
}

impl IngestContext {
    pub fn new(
        balances: Arc<dyn BalanceSource>,
        tickers: Arc<dyn TickerSource>,
        fiat_feed: Arc<dyn FiatPriceFeed>,
        store: Arc<dyn SeriesStore>,
        publisher: LivePublisher,
        base_market: CurrencyCode,
        fiat_currency: CurrencyCode,
    ) -> Self {
        Self {
            balances,
            resolver: PriceResolver::new(tickers),
            fiat: FiatConverter::new(fiat_feed),
            store,
            publisher,
            base_market,
            fiat_currency,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Upper bound on each external call.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn SeriesStore> {
        &self.store
    }

    pub fn publisher(&self) -> &LivePublisher {
        &self.publisher
    }

    /// Run one cycle for the poll scheduled at `tick`.
    ///
    /// Fails only when the balance fetch itself fails; per-currency failures
    /// are reported in the returned [`CycleReport`].
    pub async fn run_cycle(&self, tick: DateTime<Utc>) -> Result<CycleReport> {
        let holdings = tokio::time::timeout(self.call_timeout, self.balances.fetch_balances())
            .await
            .with_context(|| {
                format!(
                    "{} balance request timed out after {:?}",
                    self.balances.name(),
                    self.call_timeout
                )
            })?
            .with_context(|| format!("Failed to fetch balances from {}", self.balances.name()))?;

        let time = epoch_minutes(tick);
        let outcomes = join_all(
            holdings
                .iter()
                .map(|holding| self.ingest_holding(holding, time)),
        )
        .await;

        let mut report = CycleReport {
            tick,
            holdings: holdings.len(),
            appended: Vec::new(),
            failed: Vec::new(),
        };
        for (holding, outcome) in holdings.into_iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.appended.push(holding.currency),
                Err(failure) => {
                    tracing::warn!(
                        currency = %holding.currency,
                        stage = %failure.stage(),
                        error = %failure,
                        "Skipping currency for this cycle"
                    );
                    report.failed.push(FailedCurrency {
                        currency: holding.currency,
                        stage: failure.stage(),
                        error: failure.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            tick = %tick,
            holdings = report.holdings,
            appended = report.appended.len(),
            failed = report.failed.len(),
            "Poll cycle complete"
        );
        Ok(report)
    }

    async fn ingest_holding(&self, holding: &Holding, time: i64) -> Result<(), CurrencyFailure> {
        let quote = bounded(
            self.call_timeout,
            Stage::Ticker,
            self.resolver.resolve(&holding.currency, &self.base_market),
        )
        .await??;

        let price_fiat = bounded(
            self.call_timeout,
            Stage::Fiat,
            self.fiat
                .to_fiat(quote.price_in_base, holding.balance, &self.fiat_currency),
        )
        .await?
        .map_err(CurrencyFailure::Fiat)?;

        let sample = Sample::new(time, holding.balance, &quote, price_fiat);
        self.store
            .append(&holding.currency, &sample)
            .await
            .map_err(CurrencyFailure::Store)?;

        let receivers = self
            .publisher
            .publish(LiveEvent::new(holding.currency.clone(), sample));
        tracing::debug!(currency = %holding.currency, receivers, "Published sample");
        Ok(())
    }
}

async fn bounded<F: Future>(
    limit: Duration,
    stage: Stage,
    call: F,
) -> Result<F::Output, CurrencyFailure> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| CurrencyFailure::Timeout { stage, limit })
}
