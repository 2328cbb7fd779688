//! HMAC-SHA256 request signing shared by both venue adapters' REST calls.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign `payload` with `secret`, returning a lowercase hex digest. This
/// matches the maker venue's `method+endpoint+sorted(query)` signing scheme
/// (the caller is responsible for building `payload` in that shape).
pub fn sign_hex(secret: &str, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts a key of any length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Current Unix-milli timestamp, used in the maker venue's signed-request
/// timestamp field.
pub fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_hex_is_deterministic() {
        let a = sign_hex("secret", "GET/api/v3/order?symbol=RMVUSDT");
        let b = sign_hex("secret", "GET/api/v3/order?symbol=RMVUSDT");
        assert_eq!(a, b);
    }

    #[test]
    fn different_payloads_sign_differently() {
        let a = sign_hex("secret", "payload-a");
        let b = sign_hex("secret", "payload-b");
        assert_ne!(a, b);
    }

}
