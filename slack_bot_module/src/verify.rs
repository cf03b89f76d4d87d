//! Slack request signature verification (`v0` HMAC-SHA256 scheme).

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Requests older than this are rejected to limit replay.
const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

/// Check the `x-slack-signature` header of a request against the signing
/// secret. `now` is the current unix time in seconds.
pub fn verify_slack(secret: &str, headers: &HeaderMap, body: &[u8], now: i64) -> Result<(), &'static str> {
    let signature = headers
        .get("x-slack-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or("missing_signature")?;
    let timestamp = headers
        .get("x-slack-request-timestamp")
        .and_then(|value| value.to_str().ok())
        .ok_or("missing_timestamp")?;
    let timestamp_value: i64 = timestamp.parse().map_err(|_| "invalid_timestamp")?;

    if (now - timestamp_value).abs() > MAX_CLOCK_SKEW_SECS {
        return Err("stale_timestamp");
    }

    let provided = signature
        .strip_prefix("v0=")
        .and_then(|hex_digest| hex::decode(hex_digest).ok())
        .ok_or("invalid_signature")?;

    let mut mac = signing_mac(secret, timestamp, body)?;
    mac.verify_slice(&provided).map_err(|_| "invalid_signature")
}

/// Compute the `v0=<hex>` signature Slack would send for a request.
pub fn sign_slack_request(secret: &str, timestamp: &str, body: &[u8]) -> Result<String, &'static str> {
    let mac = signing_mac(secret, timestamp, body)?;
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

fn signing_mac(secret: &str, timestamp: &str, body: &[u8]) -> Result<Hmac<Sha256>, &'static str> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "bad_secret")?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}
