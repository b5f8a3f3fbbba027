// /consult-payments/services/payment-service/src/core/verifier.rs

use std::collections::BTreeMap;
use bigdecimal::BigDecimal;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Field redirect callback yang berisi signature
pub const SIGNATURE_FIELD: &str = "hash";

/// Verifier untuk amount digest dan perbandingan nominal
#[derive(Clone)]
pub struct AmountVerifier {
    digest_secret: String,
    epsilon: BigDecimal,
}

impl AmountVerifier {
    pub fn new(digest_secret: impl Into<String>, epsilon: BigDecimal) -> Self {
        Self {
            digest_secret: digest_secret.into(),
            epsilon,
        }
    }

    pub fn epsilon(&self) -> &BigDecimal {
        &self.epsilon
    }

    /// Digest HMAC-SHA256 atas {booking id, amount, user id}
    pub fn compute_digest(&self, booking_id: Uuid, amount: &BigDecimal, user_id: Uuid) -> String {
        let message = format!("{}|{}|{}", booking_id, canonical_amount(amount), user_id);
        hmac_hex(self.digest_secret.as_bytes(), message.as_bytes())
    }

    pub fn amounts_match(&self, a: &BigDecimal, b: &BigDecimal) -> bool {
        amounts_match(a, b, &self.epsilon)
    }
}

/// Amount selalu diformat dua desimal sebelum di-hash atau dikirim ke gateway
pub fn canonical_amount(amount: &BigDecimal) -> String {
    amount.round(2).with_scale(2).to_string()
}

/// Perbandingan toleran terhadap drift representasi, bukan strict equality
pub fn amounts_match(a: &BigDecimal, b: &BigDecimal, epsilon: &BigDecimal) -> bool {
    (a - b).abs() < *epsilon
}

/// Lolos jika digest tersimpan ATAU digest yang diterima sama dengan hasil hitung ulang
pub fn verify_digest(received: Option<&str>, stored: Option<&str>, computed: &str) -> bool {
    let matches = |candidate: Option<&str>| {
        candidate
            .map(|value| constant_time_eq(value.trim().as_bytes(), computed.as_bytes()))
            .unwrap_or(false)
    };

    matches(stored) || matches(received)
}

/// Signature untuk redirect callback: HMAC atas pasangan key=value yang diurutkan
#[cfg(test)]
pub fn sign_params(params: &BTreeMap<String, String>, secret: &str) -> String {
    hmac_hex(secret.as_bytes(), signing_payload(params).as_bytes())
}

pub fn verify_signature(params: &BTreeMap<String, String>, secret: &str) -> bool {
    let Some(provided) = params.get(SIGNATURE_FIELD) else {
        return false;
    };

    let Ok(provided_bytes) = hex::decode(provided.trim().to_ascii_lowercase()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(signing_payload(params).as_bytes());
    mac.verify_slice(&provided_bytes).is_ok()
}

fn signing_payload(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != SIGNATURE_FIELD)
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_hex(key: &[u8], message: &[u8]) -> String {
    // HMAC menerima key dengan panjang berapa pun
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Credential Basic auth webhook dibandingkan tanpa short-circuit
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn verifier() -> AmountVerifier {
        AmountVerifier::new(
            "test-digest-secret-with-enough-entropy",
            BigDecimal::from_str("0.01").unwrap(),
        )
    }

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    #[test]
    fn test_digest_is_deterministic_and_scale_insensitive() {
        let v = verifier();
        let booking = Uuid::new_v4();
        let user = Uuid::new_v4();

        let a = v.compute_digest(booking, &dec("1500"), user);
        let b = v.compute_digest(booking, &dec("1500.00"), user);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_digest_round_trip_verifies() {
        let v = verifier();
        let booking = Uuid::new_v4();
        let user = Uuid::new_v4();
        let amount = dec("1500.0");

        let stored = v.compute_digest(booking, &amount, user);
        let recomputed = v.compute_digest(booking, &amount, user);
        assert!(verify_digest(Some(&stored), Some(&stored), &recomputed));
    }

    #[test]
    fn test_changing_any_input_breaks_digest() {
        let v = verifier();
        let booking = Uuid::new_v4();
        let user = Uuid::new_v4();
        let amount = dec("1500.00");
        let stored = v.compute_digest(booking, &amount, user);

        let other_booking = v.compute_digest(Uuid::new_v4(), &amount, user);
        let other_amount = v.compute_digest(booking, &dec("1800.00"), user);
        let other_user = v.compute_digest(booking, &amount, Uuid::new_v4());

        for recomputed in [other_booking, other_amount, other_user] {
            assert_ne!(stored, recomputed);
            assert!(!verify_digest(Some(&stored), Some(&stored), &recomputed));
        }
    }

    #[test]
    fn test_verify_digest_or_policy() {
        assert!(verify_digest(Some("abc"), None, "abc"));
        assert!(verify_digest(None, Some("abc"), "abc"));
        assert!(verify_digest(Some("zzz"), Some("abc"), "abc"));
        assert!(!verify_digest(None, None, "abc"));
        assert!(!verify_digest(Some("zzz"), Some("yyy"), "abc"));
    }

    #[test]
    fn test_amounts_match_uses_epsilon() {
        let v = verifier();
        assert!(v.amounts_match(&dec("1500.00"), &dec("1500")));
        assert!(v.amounts_match(&dec("1500.004"), &dec("1500.00")));
        assert!(!v.amounts_match(&dec("1500.02"), &dec("1500.00")));
        assert!(!v.amounts_match(&dec("1800"), &dec("1500")));
    }

    #[test]
    fn test_canonical_amount_has_two_decimals() {
        assert_eq!(canonical_amount(&dec("1500")), "1500.00");
        assert_eq!(canonical_amount(&dec("99.5")), "99.50");
        assert_eq!(canonical_amount(&dec("10.129")), "10.13");
    }

    #[test]
    fn test_signature_sign_and_verify() {
        let mut params = BTreeMap::new();
        params.insert("order_id".to_string(), "ORDER_1".to_string());
        params.insert("payment_status".to_string(), "CHARGED".to_string());
        params.insert("amount".to_string(), "1500.00".to_string());

        let signature = sign_params(&params, "response-key");
        params.insert(SIGNATURE_FIELD.to_string(), signature.to_uppercase());
        assert!(verify_signature(&params, "response-key"));
        assert!(!verify_signature(&params, "other-key"));

        params.insert("amount".to_string(), "1.00".to_string());
        assert!(!verify_signature(&params, "response-key"));
    }

    #[test]
    fn test_signature_missing_or_garbage_rejected() {
        let mut params = BTreeMap::new();
        params.insert("order_id".to_string(), "ORDER_1".to_string());
        assert!(!verify_signature(&params, "response-key"));

        params.insert(SIGNATURE_FIELD.to_string(), "not-hex".to_string());
        assert!(!verify_signature(&params, "response-key"));
    }
}
