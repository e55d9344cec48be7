use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

use crate::duration::deserialize_duration;
use crate::models::CurrencyCode;

pub const API_KEY_ENV: &str = "COINBOOK_API_KEY";
pub const API_SECRET_ENV: &str = "COINBOOK_API_SECRET";

fn default_base_market() -> String {
    "BTC".to_string()
}

fn default_fiat_currency() -> String {
    "CAD".to_string()
}

/// Exchange credentials and endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: crate::exchange::bittrex::DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Fiat price feed endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceFeedConfig {
    pub base_url: String,

    /// Feed id of the base market asset. Derived from `base_market` when unset.
    pub asset_id: Option<String>,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            base_url: crate::market_data::providers::coinmarketcap::DEFAULT_API_BASE.to_string(),
            asset_id: None,
        }
    }
}

fn default_request_timeout() -> Duration {
    crate::ingest::DEFAULT_CALL_TIMEOUT
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Upper bound on every external call made during a poll cycle.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,

    /// Second of each minute at which the poll fires.
    pub poll_second: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            poll_second: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,

    /// Snapshot destination. Relative paths are resolved from the data directory.
    pub dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("backups"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Events buffered per subscriber before the oldest are dropped.
    pub channel_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            channel_capacity: crate::live::DEFAULT_CAPACITY,
        }
    }
}

/// Application configuration as written in the TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// Market every other asset is priced against.
    pub base_market: String,

    /// Currency the fiat value of each holding is reported in.
    pub fiat_currency: String,

    pub exchange: ExchangeConfig,
    pub price_feed: PriceFeedConfig,
    pub schedule: ScheduleConfig,
    pub backup: BackupConfig,
    pub live: LiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            base_market: default_base_market(),
            fiat_currency: default_fiat_currency(),
            exchange: ExchangeConfig::default(),
            price_feed: PriceFeedConfig::default(),
            schedule: ScheduleConfig::default(),
            backup: BackupConfig::default(),
            live: LiveConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Replace credentials with values from the environment, when present.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.is_empty()) {
            self.exchange.api_key = key;
        }
        if let Some(secret) = lookup(API_SECRET_ENV).filter(|v| !v.is_empty()) {
            self.exchange.api_secret = secret;
        }
    }

    /// Check everything the daemon cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.exchange.api_key.trim().is_empty() {
            anyhow::bail!("exchange.api_key is empty (or set {API_KEY_ENV})");
        }
        if self.exchange.api_secret.trim().is_empty() {
            anyhow::bail!("exchange.api_secret is empty (or set {API_SECRET_ENV})");
        }
        CurrencyCode::new(self.base_market.as_str()).context("Invalid base_market")?;
        CurrencyCode::new(self.fiat_currency.as_str()).context("Invalid fiat_currency")?;
        if self.schedule.request_timeout.is_zero() {
            anyhow::bail!("schedule.request_timeout must be greater than zero");
        }
        if self.schedule.poll_second > 59 {
            anyhow::bail!(
                "schedule.poll_second must be between 0 and 59, got {}",
                self.schedule.poll_second
            );
        }
        if self.live.channel_capacity == 0 {
            anyhow::bail!("live.channel_capacity must be at least 1");
        }
        Ok(())
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to `config_dir`.
    /// If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Validated configuration with resolved paths and typed values.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub base_market: CurrencyCode,
    pub fiat_currency: CurrencyCode,
    pub api_key: String,
    pub api_secret: SecretString,
    pub exchange_base_url: String,
    pub price_feed_base_url: String,
    pub price_feed_asset_id: Option<String>,
    pub request_timeout: Duration,
    pub poll_second: u32,
    /// Resolved snapshot directory, `None` when backups are disabled.
    pub backup_dir: Option<PathBuf>,
    pub channel_capacity: usize,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./coinbook.toml` if it exists in current directory
/// 2. `~/.local/share/coinbook/coinbook.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("coinbook.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("coinbook").join("coinbook.toml");
    }

    local_config
}

impl ResolvedConfig {
    /// Load, apply environment overrides, validate and resolve.
    ///
    /// The data directory is resolved relative to the config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let mut config = Config::load(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Self::resolve(config, config_dir)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    pub fn resolve(config: Config, config_dir: &Path) -> Result<Self> {
        config.validate()?;

        let data_dir = config.resolve_data_dir(config_dir);
        let backup_dir = config.backup.enabled.then(|| {
            if config.backup.dir.is_absolute() {
                config.backup.dir.clone()
            } else {
                data_dir.join(&config.backup.dir)
            }
        });

        Ok(Self {
            base_market: CurrencyCode::new(config.base_market)?,
            fiat_currency: CurrencyCode::new(config.fiat_currency)?,
            api_key: config.exchange.api_key,
            api_secret: SecretString::from(config.exchange.api_secret),
            exchange_base_url: config.exchange.base_url,
            price_feed_base_url: config.price_feed.base_url,
            price_feed_asset_id: config.price_feed.asset_id,
            request_timeout: config.schedule.request_timeout,
            poll_second: config.schedule.poll_second,
            backup_dir,
            channel_capacity: config.live.channel_capacity,
            data_dir,
        })
    }
}
