//! Self-signed URLs for the local backend.
//!
//! `{base_url}/{key}?method=PUT&expires=<unix>&signature=<hex>`, where the signature is
//! `HMAC-SHA256(secret, "<METHOD>\n<key>\n<expires>")`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac_hex(&self, method: &str, key: &str, expires: u64) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(method.to_uppercase().as_bytes());
        mac.update(b"\n");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Query string authorising `method` on `key` until `now + expires_in`.
    pub fn sign(&self, method: &str, key: &str, expires_in: Duration) -> Option<String> {
        let expires = SystemTime::now()
            .checked_add(expires_in)?
            .duration_since(UNIX_EPOCH)
            .ok()?
            .as_secs();
        let signature = self.mac_hex(method, key, expires)?;
        Some(format!(
            "method={}&expires={}&signature={}",
            method.to_uppercase(),
            expires,
            signature
        ))
    }

    /// Check a signature produced by [`UrlSigner::sign`] and that it has not expired.
    pub fn verify(&self, method: &str, key: &str, expires: u64, signature: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(u64::MAX);
        if now > expires {
            return false;
        }
        match self.mac_hex(method, key, expires) {
            Some(expected) => expected
                .as_bytes()
                .ct_eq(signature.to_lowercase().as_bytes())
                .into(),
            None => false,
        }
    }
}
