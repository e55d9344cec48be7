//! Request signing for the exchange's private endpoints.
//!
//! Private calls carry a nonce in the query string and an `apisign` header
//! holding the hex HMAC-SHA512 of the full request URL keyed by the API secret.

use std::sync::atomic::{AtomicU64, Ordering};

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Header the exchange reads the signature from.
pub const SIGNATURE_HEADER: &str = "apisign";

#[derive(Debug, thiserror::Error)]
pub enum SignError {
    #[error("HMAC key rejected: {0}")]
    InvalidKey(String),
}

/// Hex-encoded HMAC-SHA512 of `message` keyed by `secret`.
pub fn sign(message: &str, secret: &str) -> Result<String, SignError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| SignError::InvalidKey(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Strictly increasing nonce generator.
///
/// Nonces are milliseconds since the epoch, bumped by one whenever two
/// requests land in the same millisecond or the wall clock steps back.
#[derive(Debug, Default)]
pub struct NonceSource {
    last: AtomicU64,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now_millis: u64) -> u64 {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_millis.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}
