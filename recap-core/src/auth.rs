use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const TAG_CONTEXT: &[u8] = b"recap-webhook-secret";

/// Check a webhook secret against the configured one.
///
/// Always false when no secret is configured or none was supplied. The
/// comparison runs through `Mac::verify_slice`, which is constant-time.
pub fn authenticate(expected: Option<&str>, provided: Option<&str>) -> bool {
    let (expected, provided) = match (expected, provided) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (e, p),
        _ => return false,
    };

    let expected_tag = match tag(expected) {
        Some(mac) => mac.finalize().into_bytes(),
        None => return false,
    };

    match tag(provided) {
        Some(mac) => mac.verify_slice(&expected_tag).is_ok(),
        None => false,
    }
}

fn tag(secret: &str) -> Option<HmacSha256> {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            tracing::error!("Failed to create HMAC: {}", e);
            return None;
        }
    };
    mac.update(TAG_CONTEXT);
    Some(mac)
}
