//! Client for the exchange's v1.1 REST API.
//!
//! Every response is wrapped in `{ "success": bool, "message": str, "result": T }`.
//! A `success: false` answer with message `INVALID_MARKET` from the ticker
//! endpoint is surfaced as [`TickerOutcome::InvalidMarket`]; every other
//! failure becomes an error carrying the URL and raw body.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::signer::{sign, NonceSource, SIGNATURE_HEADER};
use super::{BalanceSource, MarketPair, TickerOutcome, TickerSource};
use crate::models::{CurrencyCode, Holding};

pub const DEFAULT_API_BASE: &str = "https://bittrex.com/api/v1.1";

const INVALID_MARKET: &str = "INVALID_MARKET";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BalanceEntry {
    currency: String,
    #[serde(default)]
    balance: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TickerEntry {
    #[serde(default)]
    ask: Option<Decimal>,
}

pub struct BittrexClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: SecretString,
    nonces: NonceSource,
}

impl BittrexClient {
    pub fn new(api_key: impl Into<String>, api_secret: SecretString) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
            api_secret,
            nonces: NonceSource::new(),
        }
    }

    /// Use a preconfigured reqwest client (timeouts, proxies).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn balances_url(&self, nonce: u64) -> String {
        format!(
            "{}/account/getbalances?apikey={}&nonce={}",
            self.base_url, self.api_key, nonce
        )
    }

    fn ticker_url(&self, pair: &MarketPair) -> String {
        format!("{}/public/getticker?market={}", self.base_url, pair)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        signature: Option<String>,
    ) -> Result<(Envelope<T>, String)> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("HTTP request failed: {url}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body: {url}"))?;

        if !status.is_success() {
            return Err(anyhow!("Exchange API error ({status}) for {url}: {body}"));
        }

        let envelope = serde_json::from_str(&body)
            .with_context(|| format!("Malformed exchange response for {url}: {body}"))?;
        Ok((envelope, body))
    }
}

#[async_trait::async_trait]
impl BalanceSource for BittrexClient {
    async fn fetch_balances(&self) -> Result<Vec<Holding>> {
        let nonce = self.nonces.next(Utc::now().timestamp_millis().max(0) as u64);
        let url = self.balances_url(nonce);
        let signature = sign(&url, self.api_secret.expose_secret())
            .context("Failed to sign balance request")?;

        let (envelope, body) = self.get::<Vec<BalanceEntry>>(&url, Some(signature)).await?;
        if !envelope.success {
            return Err(anyhow!(
                "Balance request rejected ({}) for {url}: {body}",
                envelope.message.unwrap_or_default()
            ));
        }
        let entries = envelope
            .result
            .with_context(|| format!("Balance response has no result for {url}: {body}"))?;

        let mut holdings = Vec::with_capacity(entries.len());
        for entry in entries {
            match CurrencyCode::new(entry.currency) {
                Ok(currency) => {
                    holdings.push(Holding::new(currency, entry.balance.unwrap_or_default()));
                }
                Err(err) => tracing::warn!(error = %err, "Skipping balance with unusable currency code"),
            }
        }
        Ok(holdings)
    }

    fn name(&self) -> &str {
        "bittrex"
    }
}

#[async_trait::async_trait]
impl TickerSource for BittrexClient {
    async fn fetch_ticker(&self, pair: &MarketPair) -> Result<TickerOutcome> {
        let url = self.ticker_url(pair);
        let (envelope, body) = self.get::<TickerEntry>(&url, None).await?;

        if !envelope.success {
            if envelope.message.as_deref() == Some(INVALID_MARKET) {
                return Ok(TickerOutcome::InvalidMarket);
            }
            return Err(anyhow!(
                "Ticker request rejected ({}) for {url}: {body}",
                envelope.message.unwrap_or_default()
            ));
        }

        envelope
            .result
            .and_then(|ticker| ticker.ask)
            .map(TickerOutcome::Ask)
            .with_context(|| format!("Ticker response has no ask for {url}: {body}"))
    }

    fn name(&self) -> &str {
        "bittrex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(value: &str) -> CurrencyCode {
        CurrencyCode::new(value).unwrap()
    }

    fn client() -> BittrexClient {
        BittrexClient::new("key", SecretString::from("secret".to_string()))
            .with_base_url("https://example.test/api/v1.1/")
    }

    #[test]
    fn test_urls() {
        let client = client();
        assert_eq!(
            client.balances_url(42),
            "https://example.test/api/v1.1/account/getbalances?apikey=key&nonce=42"
        );
        let pair = MarketPair::new(code("BTC"), code("ETH"));
        assert_eq!(
            client.ticker_url(&pair),
            "https://example.test/api/v1.1/public/getticker?market=BTC-ETH"
        );
    }

    #[test]
    fn test_parse_balance_envelope() {
        let body = r#"{
            "success": true,
            "message": "",
            "result": [
                {"Currency": "BTC", "Balance": 0.5, "Available": 0.5, "Pending": 0},
                {"Currency": "DOGE", "Balance": null}
            ]
        }"#;
        let envelope: Envelope<Vec<BalanceEntry>> = serde_json::from_str(body).unwrap();
        assert!(envelope.success);
        let entries = envelope.result.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].balance, Some("0.5".parse().unwrap()));
        assert_eq!(entries[1].balance, None);
    }

    #[test]
    fn test_parse_invalid_market_envelope() {
        let body = r#"{"success": false, "message": "INVALID_MARKET", "result": null}"#;
        let envelope: Envelope<TickerEntry> = serde_json::from_str(body).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.message.as_deref(), Some(INVALID_MARKET));
        assert!(envelope.result.is_none());
    }
}
