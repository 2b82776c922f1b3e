//! Payment gateway signatures (HMAC-SHA256) and webhook payloads.

use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-payment-signature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("payment signing key is not configured")]
    MissingKey,
    #[error("signature is not valid hex")]
    Malformed,
    #[error("payment signature mismatch")]
    Mismatch,
}

pub fn sign(secret: &str, message: &[u8]) -> Result<String, SignatureError> {
    let mut mac = mac_for(secret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature over `message`.
pub fn verify(secret: &str, message: &[u8], signature: &str) -> Result<(), SignatureError> {
    let mut mac = mac_for(secret)?;
    mac.update(message);
    let expected = hex::decode(signature.trim()).map_err(|_| SignatureError::Malformed)?;
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Signature the client receives from the gateway's checkout widget.
pub fn verify_checkout(key_secret: &str, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> Result<(), SignatureError> {
    verify(key_secret, checkout_message(gateway_order_id, gateway_payment_id).as_bytes(), signature)
}

/// Constant-time equality for shared secrets such as bearer tokens. An empty
/// `expected` never matches.
pub fn secrets_match(expected: &str, given: &str) -> bool {
    let (Ok(mut reference), Ok(mut candidate)) = (mac_for(expected), mac_for(expected)) else { return false };
    reference.update(expected.as_bytes());
    candidate.update(given.as_bytes());
    candidate.verify_slice(&reference.finalize().into_bytes()).is_ok()
}

pub fn checkout_message(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

pub fn new_gateway_order_id() -> String {
    let suffix: String = rand::thread_rng().sample_iter(&Alphanumeric).take(14).map(char::from).collect();
    format!("order_{suffix}")
}

fn mac_for(secret: &str) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() { return Err(SignatureError::MissingKey); }
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::MissingKey)
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("{0} event is missing gateway_payment_id")]
    MissingPaymentId(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookAction {
    Captured { gateway_payment_id: String },
    Failed,
    Ignored,
}

impl WebhookEvent {
    pub fn action(&self) -> Result<WebhookAction, WebhookError> {
        match self.event.as_str() {
            "payment.captured" => {
                let gateway_payment_id = self.gateway_payment_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
                    .ok_or_else(|| WebhookError::MissingPaymentId(self.event.clone()))?;
                Ok(WebhookAction::Captured { gateway_payment_id: gateway_payment_id.to_string() })
            }
            "payment.failed" => Ok(WebhookAction::Failed),
            _ => Ok(WebhookAction::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_signature_round_trip() {
        let sig = sign("key_secret", checkout_message("order_abc", "pay_123").as_bytes()).unwrap();
        assert!(verify_checkout("key_secret", "order_abc", "pay_123", &sig).is_ok());
        assert_eq!(verify_checkout("key_secret", "order_abc", "pay_999", &sig), Err(SignatureError::Mismatch));
        assert_eq!(verify_checkout("other", "order_abc", "pay_123", &sig), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_verify_rejects_bad_input() {
        assert_eq!(verify("secret", b"body", "not-hex"), Err(SignatureError::Malformed));
        assert_eq!(verify("", b"body", "00"), Err(SignatureError::MissingKey));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        let sig = sign("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(sig, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
    }

    #[test]
    fn test_webhook_actions() {
        let captured: WebhookEvent = serde_json::from_str(r#"{"event":"payment.captured","gateway_order_id":"order_1","gateway_payment_id":"pay_1"}"#).unwrap();
        assert_eq!(captured.action(), Ok(WebhookAction::Captured { gateway_payment_id: "pay_1".into() }));
        let other: WebhookEvent = serde_json::from_str(r#"{"event":"refund.created","gateway_order_id":"order_1"}"#).unwrap();
        assert_eq!(other.action(), Ok(WebhookAction::Ignored));
        assert!(new_gateway_order_id().starts_with("order_"));
    }

    #[test]
    fn test_capture_without_payment_id_is_rejected() {
        for body in [
            r#"{"event":"payment.captured","gateway_order_id":"order_1"}"#,
            r#"{"event":"payment.captured","gateway_order_id":"order_1","gateway_payment_id":"  "}"#,
        ] {
            let event: WebhookEvent = serde_json::from_str(body).unwrap();
            assert_eq!(event.action(), Err(WebhookError::MissingPaymentId("payment.captured".into())));
        }
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("admin-secret", "admin-secret"));
        assert!(!secrets_match("admin-secret", "admin-secreT"));
        assert!(!secrets_match("admin-secret", "admin"));
        assert!(!secrets_match("", ""));
    }
}
