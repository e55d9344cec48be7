use std::path::Path;

use secrecy::ExposeSecret;

use crate::config::ResolvedConfig;

/// Effective configuration for display, with the API secret redacted.
pub fn config_output(config_path: &Path, config: &ResolvedConfig) -> serde_json::Value {
    let secret = if config.api_secret.expose_secret().is_empty() {
        ""
    } else {
        "<redacted>"
    };
    serde_json::json!({
        "config_file": config_path.display().to_string(),
        "data_directory": config.data_dir.display().to_string(),
        "base_market": config.base_market,
        "fiat_currency": config.fiat_currency,
        "exchange": {
            "api_key": config.api_key,
            "api_secret": secret,
            "base_url": config.exchange_base_url
        },
        "price_feed": {
            "base_url": config.price_feed_base_url,
            "asset_id": config.price_feed_asset_id
        },
        "schedule": {
            "request_timeout_ms": u64::try_from(config.request_timeout.as_millis()).unwrap_or(u64::MAX),
            "poll_second": config.poll_second
        },
        "backup_directory": config.backup_dir.as_ref().map(|d| d.display().to_string()),
        "live": {
            "channel_capacity": config.channel_capacity
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_secret_is_redacted() {
        let mut raw = Config::default();
        raw.exchange.api_key = "public-key".to_string();
        raw.exchange.api_secret = "very-secret".to_string();
        let config = ResolvedConfig::resolve(raw, Path::new("/tmp/coinbook")).unwrap();

        let output = config_output(Path::new("/tmp/coinbook/coinbook.toml"), &config);
        let rendered = output.to_string();
        assert!(!rendered.contains("very-secret"));
        assert_eq!(output["exchange"]["api_secret"], "<redacted>");
        assert_eq!(output["exchange"]["api_key"], "public-key");
        assert_eq!(output["fiat_currency"], "CAD");
        assert_eq!(output["schedule"]["request_timeout_ms"], 10_000);
    }
}
