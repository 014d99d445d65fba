//! HMAC-SHA256 signature helpers.
//!
//! The gateway signs two things with the same scheme but different keys:
//! * the client-confirmation signature the buyer's app presents after checkout, computed over
//!   `"{intent_id}|{payment_id}"` with the API key secret;
//! * the webhook transport signature, computed over the raw request body with the webhook secret.
//!
//! Both arrive hex-encoded. Verification decodes the presented hex and uses `Mac::verify_slice`,
//! which compares in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 of `data` under `secret`.
pub fn hmac_hex(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_hmac(secret: &str, data: &[u8], signature_hex: &str) -> bool {
    let presented = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.verify_slice(&presented).is_ok()
}

/// Check the signature a buyer's client presents after completing a payment.
pub fn verify_payment_signature(secret: &str, intent_id: &str, payment_id: &str, signature: &str) -> bool {
    let message = format!("{intent_id}|{payment_id}");
    verify_hmac(secret, message.as_bytes(), signature)
}

/// Check the transport signature over a raw webhook body.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    verify_hmac(secret, body, signature)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_signature_round_trip() {
        let sig = hmac_hex("topsecret", b"order_abc|pay_xyz");
        assert!(verify_payment_signature("topsecret", "order_abc", "pay_xyz", &sig));
        assert!(!verify_payment_signature("topsecret", "order_abc", "pay_other", &sig));
        assert!(!verify_payment_signature("wrongsecret", "order_abc", "pay_xyz", &sig));
    }

    #[test]
    fn webhook_signature_rejects_garbage_hex() {
        assert!(!verify_webhook_signature("s3cret", b"{}", "not-hex-at-all"));
        assert!(!verify_webhook_signature("s3cret", b"{}", ""));
    }

    #[test]
    fn webhook_signature_accepts_valid() {
        let body = br#"{"event":"payment.captured"}"#;
        let sig = hmac_hex("s3cret", body);
        assert!(verify_webhook_signature("s3cret", body, &sig));
    }
}
