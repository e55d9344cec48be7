mod currency;
mod holding;
mod sample;

pub use currency::{CurrencyCode, CurrencyCodeError};
pub use holding::{Holding, PriceQuote};
pub use sample::{LiveEvent, LiveEventError, Sample, Series};
