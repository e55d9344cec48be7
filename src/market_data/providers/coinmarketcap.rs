//! CoinMarketCap fiat price feed.
//!
//! Uses the public `/ticker/{id}/?convert=FIAT` endpoint, which answers with a
//! one-element array whose entry carries `price_<fiat>` (lower case), encoded
//! as a string.

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::market_data::FiatPriceFeed;
use crate::models::CurrencyCode;

pub const DEFAULT_API_BASE: &str = "https://api.coinmarketcap.com/v1";

/// Maps an exchange symbol to the feed's asset id.
pub fn asset_id_for_symbol(symbol: &str) -> Option<&'static str> {
    let id = match symbol.to_ascii_uppercase().as_str() {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "USDT" => "tether",
        "USDC" => "usd-coin",
        "BNB" => "binance-coin",
        "LTC" => "litecoin",
        "XRP" => "ripple",
        "BCH" => "bitcoin-cash",
        "XMR" => "monero",
        "DOGE" => "dogecoin",
        _ => return None,
    };
    Some(id)
}

pub struct CoinMarketCapFeed {
    client: reqwest::Client,
    base_url: String,
    asset_id: String,
}

impl CoinMarketCapFeed {
    /// Feed quoting the asset with the given CoinMarketCap id (e.g. `bitcoin`).
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_API_BASE.to_string(),
            asset_id: asset_id.into(),
        }
    }

    /// Feed for an exchange symbol, using the built-in id table.
    pub fn for_symbol(symbol: &CurrencyCode) -> Result<Self> {
        let id = asset_id_for_symbol(symbol.as_str()).with_context(|| {
            format!("No CoinMarketCap id known for {symbol}; set price_feed.asset_id")
        })?;
        Ok(Self::new(id))
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn ticker_url(&self, fiat: &CurrencyCode) -> String {
        format!(
            "{}/ticker/{}/?convert={}",
            self.base_url, self.asset_id, fiat
        )
    }
}

/// Pull `price_<fiat>` out of a ticker payload.
///
/// Accepts the documented one-element array as well as a bare object, and the
/// price as either a JSON string or number.
fn extract_price(payload: &Value, fiat: &CurrencyCode) -> Option<Decimal> {
    let entry = match payload {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let key = format!("price_{}", fiat.as_str().to_ascii_lowercase());
    let fields: &serde_json::Map<String, Value> = entry.as_object()?;
    match fields.get(&key)? {
        Value::String(raw) => raw.trim().parse().ok(),
        Value::Number(number) => number.to_string().parse().ok(),
        _ => None,
    }
}

#[async_trait::async_trait]
impl FiatPriceFeed for CoinMarketCapFeed {
    async fn base_price_in(&self, fiat: &CurrencyCode) -> Result<Decimal> {
        let url = self.ticker_url(fiat);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("HTTP request failed: {url}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body: {url}"))?;

        if !status.is_success() {
            return Err(anyhow!("Price feed error ({status}) for {url}: {body}"));
        }

        let payload: Value = serde_json::from_str(&body)
            .with_context(|| format!("Malformed price feed response for {url}: {body}"))?;

        extract_price(&payload, fiat)
            .with_context(|| format!("Price feed response has no price_{fiat} for {url}: {body}"))
    }

    fn name(&self) -> &str {
        "coinmarketcap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(value: &str) -> CurrencyCode {
        CurrencyCode::new(value).unwrap()
    }

    const SAMPLE_RESPONSE: &str = r#"[
        {
            "id": "bitcoin",
            "name": "Bitcoin",
            "symbol": "BTC",
            "price_usd": "6412.25",
            "price_btc": "1.0",
            "price_cad": "8290.10513"
        }
    ]"#;

    #[test]
    fn test_extract_price_from_array_payload() {
        let payload: Value = serde_json::from_str(SAMPLE_RESPONSE).unwrap();
        assert_eq!(
            extract_price(&payload, &code("CAD")),
            Some("8290.10513".parse().unwrap())
        );
        assert_eq!(
            extract_price(&payload, &code("usd")),
            Some("6412.25".parse().unwrap())
        );
        assert_eq!(extract_price(&payload, &code("EUR")), None);
    }

    #[test]
    fn test_extract_price_from_object_with_number() {
        let payload = serde_json::json!({"price_usd": 100});
        assert_eq!(
            extract_price(&payload, &code("USD")),
            Some(Decimal::from(100))
        );
    }

    #[test]
    fn test_extract_price_rejects_garbage() {
        assert_eq!(extract_price(&serde_json::json!([]), &code("USD")), None);
        assert_eq!(
            extract_price(&serde_json::json!({"price_usd": "n/a"}), &code("USD")),
            None
        );
        assert_eq!(
            extract_price(&serde_json::json!({"price_usd": null}), &code("USD")),
            None
        );
    }

    #[test]
    fn test_symbol_table() {
        assert_eq!(asset_id_for_symbol("btc"), Some("bitcoin"));
        assert_eq!(asset_id_for_symbol("ETH"), Some("ethereum"));
        assert_eq!(asset_id_for_symbol("NOPE"), None);
        assert!(CoinMarketCapFeed::for_symbol(&code("NOPE")).is_err());
    }

    #[test]
    fn test_ticker_url() {
        let feed = CoinMarketCapFeed::new("bitcoin").with_base_url("http://localhost:9/v1/");
        assert_eq!(
            feed.ticker_url(&code("CAD")),
            "http://localhost:9/v1/ticker/bitcoin/?convert=CAD"
        );
    }
}
