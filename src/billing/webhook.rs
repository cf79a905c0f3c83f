use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::AppError;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Events older (or newer) than this are rejected outright.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Verify a `t=<unix>,v1=<hex>` signature header over the raw payload.
/// The signed message is `<timestamp>.<payload>`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| AppError::Validation("malformed webhook signature".into()))?;
    if candidates.is_empty() {
        return Err(AppError::Validation("malformed webhook signature".into()));
    }

    if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(AppError::Validation(
            "webhook signature timestamp outside tolerance".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("failed to build HMAC: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    for candidate in candidates {
        if let Ok(signature) = hex::decode(candidate) {
            if mac.clone().verify_slice(&signature).is_ok() {
                return Ok(());
            }
        }
    }

    Err(AppError::Validation("invalid webhook signature".into()))
}

/// Build a signature header for a payload. Counterpart of
/// `verify_signature`, used by integration tests to forge deliveries.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// Envelope of a provider webhook delivery.
#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    #[serde(rename = "type")]
    pub kind: String,
    /// Provider-side creation time, unix seconds. Drives last-write-wins.
    pub created: i64,
    pub data: BillingEventData,
}

#[derive(Debug, Deserialize)]
pub struct BillingEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionMetadata {
    pub user_id: Option<String>,
    pub plan_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: SubscriptionMetadata,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceObject {
    pub subscription: Option<String>,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_signature_round_trip() {
        let payload = br#"{"type":"customer.subscription.created"}"#;
        let now = Utc::now();
        let header = sign_payload(payload, SECRET, now.timestamp());
        assert!(verify_signature(payload, &header, SECRET, now).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let payload = br#"{"amount": 100}"#;
        let now = Utc::now();
        let header = sign_payload(payload, SECRET, now.timestamp());
        let result = verify_signature(br#"{"amount": 99999}"#, &header, SECRET, now);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"{}";
        let now = Utc::now();
        let header = sign_payload(payload, "whsec_other", now.timestamp());
        assert!(verify_signature(payload, &header, SECRET, now).is_err());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let now = Utc::now();
        let header = sign_payload(payload, SECRET, now.timestamp() - 10_000);
        assert!(verify_signature(payload, &header, SECRET, now).is_err());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let now = Utc::now();
        assert!(verify_signature(b"{}", "garbage", SECRET, now).is_err());
        assert!(verify_signature(b"{}", "t=notanumber,v1=00", SECRET, now).is_err());
        assert!(verify_signature(b"{}", "v1=00", SECRET, now).is_err());
    }

    #[test]
    fn test_event_envelope_parsing() {
        let raw = serde_json::json!({
            "type": "customer.subscription.updated",
            "created": 1700000000,
            "data": {
                "object": {
                    "id": "sub_1",
                    "customer": "cus_1",
                    "status": "past_due",
                    "current_period_start": 1700000000,
                    "current_period_end": 1702592000,
                    "cancel_at_period_end": true,
                    "metadata": { "user_id": "u", "plan_id": "p" }
                }
            }
        });

        let event: BillingEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.kind, "customer.subscription.updated");

        let object: SubscriptionObject = serde_json::from_value(event.data.object).unwrap();
        assert_eq!(object.status, "past_due");
        assert!(object.cancel_at_period_end);
    }

    #[test]
    fn test_invoice_parsing_defaults() {
        let raw = serde_json::json!({
            "subscription": "sub_1",
            "payment_intent": "pi_1",
            "amount_paid": 999,
            "currency": "usd"
        });
        let invoice: InvoiceObject = serde_json::from_value(raw).unwrap();
        assert_eq!(invoice.amount_paid, 999);
        assert_eq!(invoice.amount_due, 0);
    }
}
