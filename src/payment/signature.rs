//! HMAC-SHA256 signatures used by the payment gateway
//!
//! Comparisons go through `Mac::verify_slice`, which is constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex HMAC-SHA256 of `message`
pub fn sign(secret: &str, message: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(message);
            hex::encode(mac.finalize().into_bytes())
        }
        // HMAC accepts keys of any length
        Err(_) => String::new(),
    }
}

fn verify(secret: &str, message: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

/// Message the gateway signs for a client-relayed confirmation
pub fn payment_message(remote_order_id: &str, remote_payment_id: &str) -> String {
    format!("{}|{}", remote_order_id, remote_payment_id)
}

/// Check the signature returned to the checkout widget
pub fn verify_payment_signature(
    secret: &str,
    remote_order_id: &str,
    remote_payment_id: &str,
    signature: &str,
) -> bool {
    verify(
        secret,
        payment_message(remote_order_id, remote_payment_id).as_bytes(),
        signature,
    )
}

/// Check a webhook signature over the exact bytes received
pub fn verify_webhook_signature(secret: &str, raw_body: &[u8], signature: &str) -> bool {
    verify(secret, raw_body, signature)
}
