//! HMAC helpers for the meeting provider's webhook scheme.
//!
//! Requests are signed as `v0=` + hex(HMAC-SHA256(secret, "v0:{timestamp}:{body}")),
//! and the URL validation handshake answers with hex(HMAC-SHA256(secret, plainToken)).

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_VERSION: &str = "v0";

#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("webhook secret is not configured")]
    MissingSecret,
    #[error("missing signature header")]
    MissingSignature,
    #[error("missing request timestamp header")]
    MissingTimestamp,
    #[error("request timestamp is not a unix timestamp")]
    InvalidTimestamp,
    #[error("request timestamp outside the accepted window")]
    StaleTimestamp,
    #[error("signature mismatch")]
    Mismatch,
}

fn mac_for(secret: &str) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::MissingSecret)
}

/// Hex HMAC used to answer the endpoint URL validation challenge.
pub fn encrypt_token(secret: &str, plain_token: &str) -> Result<String, SignatureError> {
    let mut mac = mac_for(secret)?;
    mac.update(plain_token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Produces the value the provider sends in its signature header.
pub fn sign_request(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = mac_for(secret)?;
    mac.update(format!("{}:{}:", SIGNATURE_VERSION, timestamp).as_bytes());
    mac.update(body);
    Ok(format!("{}={}", SIGNATURE_VERSION, hex::encode(mac.finalize().into_bytes())))
}

/// Verifies a signed webhook request.
///
/// `tolerance_seconds <= 0` disables the replay window check.
pub fn verify_request(
    secret: &str,
    signature: Option<&str>,
    timestamp: Option<&str>,
    body: &[u8],
    tolerance_seconds: i64,
) -> Result<(), SignatureError> {
    let signature = signature.filter(|s| !s.is_empty()).ok_or(SignatureError::MissingSignature)?;
    let timestamp = timestamp.filter(|t| !t.is_empty()).ok_or(SignatureError::MissingTimestamp)?;

    if tolerance_seconds > 0 {
        let sent_at: i64 = timestamp.trim().parse().map_err(|_| SignatureError::InvalidTimestamp)?;
        // Some senders use milliseconds.
        let sent_at = if sent_at > 10_000_000_000 { sent_at / 1000 } else { sent_at };
        if (Utc::now().timestamp() - sent_at).abs() > tolerance_seconds {
            debug!("Webhook timestamp {} outside {}s window", sent_at, tolerance_seconds);
            return Err(SignatureError::StaleTimestamp);
        }
    }

    let provided = signature
        .strip_prefix(&format!("{}=", SIGNATURE_VERSION))
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or(SignatureError::Mismatch)?;

    let mut mac = mac_for(secret)?;
    mac.update(format!("{}:{}:", SIGNATURE_VERSION, timestamp).as_bytes());
    mac.update(body);
    mac.verify_slice(&provided).map_err(|_| SignatureError::Mismatch)
}
