use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{CurrencyCode, Series};
use crate::storage::SeriesStore;

#[derive(Debug, Serialize)]
pub struct SeriesListOutput {
    pub currency: CurrencyCode,
    pub samples: usize,
    pub last_time: Option<i64>,
}

/// Every stored series with its size and most recent sample time.
pub async fn list_series(store: &dyn SeriesStore) -> Result<Vec<SeriesListOutput>> {
    let mut output = Vec::new();
    for currency in store.list_all().await? {
        let Some(series) = store.get_one(&currency).await? else {
            continue;
        };
        output.push(SeriesListOutput {
            samples: series.values.len(),
            last_time: series.last().map(|s| s.time),
            currency,
        });
    }
    Ok(output)
}

/// The full series for `code`; a code with no series is an error.
pub async fn show_series(store: &dyn SeriesStore, code: &str) -> Result<Series> {
    let currency = CurrencyCode::new(code)?;
    store
        .get_one(&currency)
        .await?
        .with_context(|| format!("No series found for {currency}"))
}
