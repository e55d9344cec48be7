//! Wiring between configuration and the ingestion core, plus the read-side
//! queries used by the CLI.

mod config;
mod series;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::backup::SnapshotBackup;
use crate::config::ResolvedConfig;
use crate::exchange::BittrexClient;
use crate::ingest::IngestContext;
use crate::live::LivePublisher;
use crate::market_data::providers::CoinMarketCapFeed;
use crate::scheduler::Scheduler;
use crate::storage::JsonlSeriesStore;

pub use config::config_output;
pub use series::{list_series, show_series, SeriesListOutput};

/// Long-lived components shared by every poll cycle.
pub struct Services {
    pub ingest: Arc<IngestContext>,
    pub store: Arc<JsonlSeriesStore>,
    pub publisher: LivePublisher,
}

fn http_client(config: &ResolvedConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Build the ingestion stack. Fails when the store cannot be opened, which
/// is fatal at startup.
pub async fn build_services(config: &ResolvedConfig) -> Result<Services> {
    let client = http_client(config)?;

    let exchange = Arc::new(
        BittrexClient::new(config.api_key.clone(), config.api_secret.clone())
            .with_client(client.clone())
            .with_base_url(config.exchange_base_url.clone()),
    );

    let feed = match &config.price_feed_asset_id {
        Some(asset_id) => CoinMarketCapFeed::new(asset_id.clone()),
        None => CoinMarketCapFeed::for_symbol(&config.base_market)?,
    }
    .with_client(client)
    .with_base_url(config.price_feed_base_url.clone());

    let store = Arc::new(
        JsonlSeriesStore::open(&config.data_dir)
            .await
            .with_context(|| {
                format!("Failed to open series store in {}", config.data_dir.display())
            })?,
    );
    let publisher = LivePublisher::new(config.channel_capacity);

    let ingest = IngestContext::new(
        exchange.clone(),
        exchange,
        Arc::new(feed),
        store.clone(),
        publisher.clone(),
        config.base_market.clone(),
        config.fiat_currency.clone(),
    )
    .with_call_timeout(config.request_timeout);

    tracing::info!(
        data_dir = %config.data_dir.display(),
        base_market = %config.base_market,
        fiat_currency = %config.fiat_currency,
        "Services ready"
    );

    Ok(Services {
        ingest: Arc::new(ingest),
        store,
        publisher,
    })
}

/// Scheduler for the daemon; the midnight backup is attached unless disabled.
pub fn scheduler(services: &Services, config: &ResolvedConfig, backups: bool) -> Scheduler {
    let scheduler =
        Scheduler::new(services.ingest.clone()).with_poll_second(config.poll_second);
    match (&config.backup_dir, backups) {
        (Some(dir), true) => scheduler.with_backup(
            Arc::new(SnapshotBackup::new(dir)),
            services.store.backup_target(),
        ),
        _ => scheduler,
    }
}
