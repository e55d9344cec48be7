//! In-memory series store for tests and dry runs.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::models::{CurrencyCode, Sample, Series};

use super::{check_order, SeriesStore};

#[derive(Default)]
pub struct MemorySeriesStore {
    series: Mutex<HashMap<CurrencyCode, Series>>,
}

impl MemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SeriesStore for MemorySeriesStore {
    async fn append(&self, currency: &CurrencyCode, sample: &Sample) -> Result<()> {
        let mut series = self.series.lock().await;
        let last = series
            .get(currency)
            .and_then(|s| s.last())
            .map(|s| s.time);
        check_order(currency, last, sample)?;
        series
            .entry(currency.clone())
            .or_insert_with(|| Series::new(currency.clone()))
            .values
            .push(sample.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<CurrencyCode>> {
        let series = self.series.lock().await;
        let mut ids: Vec<CurrencyCode> = series.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_one(&self, currency: &CurrencyCode) -> Result<Option<Series>> {
        let series = self.series.lock().await;
        Ok(series.get(currency).cloned())
    }
}
