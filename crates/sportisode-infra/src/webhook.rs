//! Inbound webhook signature verification
//!
//! Providers sign `"{timestamp}.{raw body}"` with HMAC-SHA256 and send
//! `t=<unix seconds>,v1=<hex digest>` in a header. The header may carry several
//! `v1` entries while secrets are being rotated; any match is accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use sportisode_core::AppError;
use std::str::FromStr;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Default replay window for signed webhooks
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing webhook signature")]
    Missing,
    #[error("Malformed webhook signature header")]
    Malformed,
    #[error("Webhook signature mismatch")]
    Mismatch,
    #[error("Webhook signature timestamp outside tolerance")]
    Expired,
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

/// Parsed `t=..,v1=..` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl FromStr for SignatureHeader {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in s.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or(SignatureError::Malformed)?;
            match key {
                "t" => {
                    let ts = value.parse::<i64>().map_err(|_| SignatureError::Malformed)?;
                    timestamp = Some(ts);
                }
                "v1" if !value.is_empty() => signatures.push(value.to_ascii_lowercase()),
                // other schemes are ignored
                _ => {}
            }
        }

        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Ok(Self {
                timestamp,
                signatures,
            }),
            _ => Err(SignatureError::Malformed),
        }
    }
}

fn digest(secret: &str, timestamp: i64, body: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    digest(secret, timestamp, body).map(hex::encode)
}

/// Full header value for a payload, as a provider would send it
pub fn signature_header(
    secret: &str,
    timestamp: i64,
    body: &[u8],
) -> Result<String, SignatureError> {
    Ok(format!("t={},v1={}", timestamp, sign(secret, timestamp, body)?))
}

/// Verify a signature header against the raw body.
///
/// `now` is unix seconds; timestamps further than `tolerance_secs` from it in
/// either direction are rejected.
pub fn verify_signature(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let header: SignatureHeader = header.ok_or(SignatureError::Missing)?.parse()?;

    if (now - header.timestamp).abs() > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    let expected = digest(secret, header.timestamp, body)?;
    let matched = header.signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| bool::from(bytes.ct_eq(&expected)))
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
