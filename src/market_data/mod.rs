mod fiat;
pub mod providers;
mod resolver;

pub use fiat::{round_fiat, FiatConverter, FiatPriceFeed};
pub use resolver::{PriceResolver, ResolveError};
