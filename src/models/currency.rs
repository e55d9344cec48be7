use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid currency code {value:?}: codes must be 1-16 ASCII letters or digits")]
pub struct CurrencyCodeError {
    value: String,
}

/// Ticker symbol of an exchange asset (e.g. `BTC`, `USDT`).
///
/// Codes are normalized to upper case and restricted to ASCII alphanumerics,
/// which also makes them safe to use as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    const MAX_LEN: usize = 16;

    pub fn new(value: impl Into<String>) -> Result<Self, CurrencyCodeError> {
        let value = value.into();
        let normalized = value.trim().to_ascii_uppercase();
        if Self::is_valid(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(CurrencyCodeError { value })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(value: &str) -> bool {
        !value.is_empty()
            && value.len() <= Self::MAX_LEN
            && value.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for CurrencyCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CurrencyCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_case_and_whitespace() {
        let code = CurrencyCode::new(" btc ").unwrap();
        assert_eq!(code.as_str(), "BTC");
    }

    #[test]
    fn test_new_rejects_unsafe_values() {
        assert!(CurrencyCode::new("").is_err());
        assert!(CurrencyCode::new("..").is_err());
        assert!(CurrencyCode::new("../etc").is_err());
        assert!(CurrencyCode::new("BTC/USD").is_err());
        assert!(CurrencyCode::new("BTC-USD").is_err());
        assert!(CurrencyCode::new("bad\0code").is_err());
        assert!(CurrencyCode::new("A".repeat(17)).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let code: CurrencyCode = serde_json::from_str("\"usdt\"").unwrap();
        assert_eq!(code, "USDT");
        assert!(serde_json::from_str::<CurrencyCode>("\"a/b\"").is_err());
    }
}
