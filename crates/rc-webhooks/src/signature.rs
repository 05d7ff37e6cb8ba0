//! HMAC-SHA256 payload signing.
//!
//! The signature is computed over the raw serialized JSON body and
//! hex-encoded. Receivers recompute it with the shared secret to verify
//! both authenticity and integrity.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature on outbound requests.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Compute the hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length; new_from_slice cannot fail for SHA-256.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded signature against `body`.
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign("secret", b"payload");
        let b = sign("secret", b"payload");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // 32 bytes hex-encoded
    }

    #[test]
    fn test_sign_differs_per_secret() {
        assert_ne!(sign("secret-a", b"payload"), sign("secret-b", b"payload"));
    }

    #[test]
    fn test_verify_round_trip() {
        let sig = sign("secret", b"{\"a\":1}");
        assert!(verify("secret", b"{\"a\":1}", &sig));
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let sig = sign("secret", b"{\"a\":1}");
        assert!(!verify("secret", b"{\"a\":2}", &sig));
    }

    #[test]
    fn test_garbage_signature_fails_verification() {
        assert!(!verify("secret", b"body", "not-hex"));
    }
}
