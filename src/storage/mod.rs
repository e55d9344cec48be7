mod jsonl;
mod memory;

pub use jsonl::JsonlSeriesStore;
pub use memory::MemorySeriesStore;

use anyhow::Result;

use crate::models::{CurrencyCode, Sample, Series};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// Appending would put an older sample after a newer one.
    #[error("sample at {attempted} for {currency} is older than the last stored sample at {last}")]
    OutOfOrder {
        currency: CurrencyCode,
        last: i64,
        attempted: i64,
    },
}

/// Append-only per-currency time series storage.
///
/// Implementations must serialize `append` per currency so that creating a
/// missing series and appending to it is never interleaved with another
/// append for the same currency.
#[async_trait::async_trait]
pub trait SeriesStore: Send + Sync {
    /// Append one sample, creating the series on first write.
    ///
    /// Samples whose `time` is earlier than the series' last sample are
    /// rejected with [`StoreError::OutOfOrder`]; equal times are accepted.
    async fn append(&self, currency: &CurrencyCode, sample: &Sample) -> Result<()>;

    /// All known series ids, sorted.
    async fn list_all(&self) -> Result<Vec<CurrencyCode>>;

    async fn get_one(&self, currency: &CurrencyCode) -> Result<Option<Series>>;
}

pub(crate) fn check_order(
    currency: &CurrencyCode,
    last: Option<i64>,
    sample: &Sample,
) -> Result<(), StoreError> {
    match last {
        Some(last) if sample.time < last => Err(StoreError::OutOfOrder {
            currency: currency.clone(),
            last,
            attempted: sample.time,
        }),
        _ => Ok(()),
    }
}
