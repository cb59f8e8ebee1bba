//! Signature check for inbound Mailgun webhooks.
//!
//! Mailgun signs `timestamp || token` with the account API key using
//! HMAC-SHA256 and sends the hex digest as `signature`. Only the
//! signature is checked here: stale timestamps and reused tokens are
//! accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac(api_key: &str, token: &str, timestamp: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(api_key.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    Some(mac)
}

/// Hex encoded signature for a token and timestamp pair.
pub fn sign(api_key: &str, token: &str, timestamp: &str) -> String {
    mac(api_key, token, timestamp)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

pub fn verify(api_key: &str, token: &str, timestamp: &str, signature: &str) -> bool {
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };
    mac(api_key, token, timestamp).is_some_and(|mac| mac.verify_slice(&signature).is_ok())
}
