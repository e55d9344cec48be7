//! Human-readable durations for config values such as request timeouts.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a duration string like "500ms", "10s", "2m" or "1h".
///
/// The input is case-insensitive and surrounding whitespace is ignored.
///
/// ```
/// use coinbook::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
/// assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_ascii_lowercase();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .context("Duration must end with ms, s, m or h")?;
    let (num, unit) = s.split_at(split);
    let num: u64 = num
        .parse()
        .with_context(|| format!("Invalid number in duration {s:?}"))?;

    let millis_per_unit: u64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => anyhow::bail!("Unknown duration unit {other:?}; use ms, s, m or h"),
    };

    let millis = num
        .checked_mul(millis_per_unit)
        .context("Duration is too large")?;
    Ok(Duration::from_millis(millis))
}

/// Serde deserializer for duration strings.
///
/// Use with `#[serde(deserialize_with = "deserialize_duration")]`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(parse_duration(" 10S ").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("\t5MS\n").unwrap(), Duration::from_millis(5));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("1.5s").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("1d").is_err());
    }

    #[test]
    fn test_overflow_rejected() {
        let max = u64::MAX.to_string();
        assert!(parse_duration(&format!("{max}h")).is_err());
        assert!(parse_duration(&format!("{max}ms")).is_ok());
    }

    #[test]
    fn test_serde_deserialize() {
        #[derive(Deserialize)]
        struct TestConfig {
            #[serde(deserialize_with = "deserialize_duration")]
            timeout: Duration,
        }

        let config: TestConfig = toml::from_str(r#"timeout = "15s""#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(15));
    }
}
