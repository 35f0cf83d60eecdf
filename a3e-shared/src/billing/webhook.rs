/// Stripe webhook verification and event parsing
///
/// The `Stripe-Signature` header looks like
/// `t=1741000000,v1=5257a869...,v1=...`. The expected signature is
/// HMAC-SHA256 of `"{t}.{raw body}"` under the endpoint secret. Any matching
/// `v1` entry is accepted as long as `t` is within the tolerance of now.
///
/// # Example
///
/// ```
/// use a3e_shared::billing::webhook::{sign_payload, verify_signature};
///
/// let secret = "whsec_test";
/// let body = br#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#;
/// let now = 1_741_000_000;
/// let header = format!("t={now},v1={}", sign_payload(secret, now, body));
///
/// assert!(verify_signature(body, &header, secret, now, 300).is_ok());
/// assert!(verify_signature(body, &header, "whsec_other", now, 300).is_err());
/// ```

use super::stripe::StripeSubscription;
use super::Subscription;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Accepted clock skew between Stripe and us
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing or malformed Stripe-Signature header")]
    MalformedHeader,

    #[error("Webhook timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("No matching webhook signature")]
    SignatureMismatch,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(mac_for(secret, timestamp, payload).finalize().into_bytes())
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Hmac<Sha256> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<SignatureHeader, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader { timestamp, signatures }),
        _ => Err(WebhookError::MalformedHeader),
    }
}

/// Verifies a webhook delivery
///
/// `now` is unix seconds; the tolerance applies in both directions.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let parsed = parse_header(header)?;

    if (now - parsed.timestamp).abs() > tolerance_secs {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let mac = mac_for(secret, parsed.timestamp, payload);
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    customer: String,
    #[serde(default)]
    subscription: Option<String>,
}

/// What a verified event asks us to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    /// `customer.subscription.created|updated`
    SubscriptionChanged(Subscription),

    /// `customer.subscription.deleted`
    SubscriptionDeleted(Subscription),

    /// `invoice.payment_failed`
    PaymentFailed {
        customer_id: String,
        subscription_id: Option<String>,
    },

    /// Any other event type; acknowledged and dropped
    Ignored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub action: WebhookAction,
}

/// Decodes a verified payload into the action it implies
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let raw: RawEvent =
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let subscription = |object: serde_json::Value| -> Result<Subscription, WebhookError> {
        serde_json::from_value::<StripeSubscription>(object)
            .map(Subscription::from)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    };

    let action = match raw.event_type.as_str() {
        "customer.subscription.created" | "customer.subscription.updated" => {
            WebhookAction::SubscriptionChanged(subscription(raw.data.object)?)
        }
        "customer.subscription.deleted" => WebhookAction::SubscriptionDeleted(subscription(raw.data.object)?),
        "invoice.payment_failed" => {
            let invoice: RawInvoice = serde_json::from_value(raw.data.object)
                .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
            WebhookAction::PaymentFailed {
                customer_id: invoice.customer,
                subscription_id: invoice.subscription,
            }
        }
        other => WebhookAction::Ignored(other.to_string()),
    };

    Ok(WebhookEvent {
        id: raw.id,
        event_type: raw.event_type,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_741_000_000;

    fn header_for(payload: &[u8], ts: i64) -> String {
        format!("t={ts},v1={}", sign_payload(SECRET, ts, payload))
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        assert_eq!(verify_signature(body, &header_for(body, NOW), SECRET, NOW, 300), Ok(()));
    }

    #[test]
    fn test_one_of_several_signatures_matches() {
        let body = br#"{"id":"evt_1"}"#;
        let header = format!(
            "t={NOW},v1={},v1={}",
            "00".repeat(32),
            sign_payload(SECRET, NOW, body)
        );
        assert!(verify_signature(body, &header, SECRET, NOW, 300).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = header_for(br#"{"amount":1}"#, NOW);
        assert_eq!(
            verify_signature(br#"{"amount":9}"#, &header, SECRET, NOW, 300),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = b"{}";
        let header = header_for(body, NOW - 301);
        assert_eq!(
            verify_signature(body, &header, SECRET, NOW, 300),
            Err(WebhookError::TimestampOutOfTolerance)
        );
        assert!(verify_signature(body, &header_for(body, NOW - 300), SECRET, NOW, 300).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "t=abc,v1=00", "v1=abcd", "t=1741000000", "t=1741000000,v1=zz"] {
            assert_eq!(
                verify_signature(b"{}", header, SECRET, NOW, 300),
                Err(WebhookError::MalformedHeader),
                "{header}"
            );
        }
    }

    #[test]
    fn test_parse_subscription_updated() {
        let body = serde_json::to_vec(&serde_json::json!({
            "id": "evt_9",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_1", "customer": "cus_1", "status": "active",
                "items": { "data": [ { "price": { "id": "price_p" } } ] }
            } }
        }))
        .unwrap();

        let event = parse_event(&body).unwrap();
        assert_eq!(event.id, "evt_9");
        match event.action {
            WebhookAction::SubscriptionChanged(sub) => {
                assert_eq!(sub.customer_id, "cus_1");
                assert_eq!(sub.status, "active");
                assert_eq!(sub.price_id.as_deref(), Some("price_p"));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_parse_payment_failed_and_unknown() {
        let failed = serde_json::to_vec(&serde_json::json!({
            "id": "evt_2",
            "type": "invoice.payment_failed",
            "data": { "object": { "customer": "cus_7", "subscription": "sub_7" } }
        }))
        .unwrap();
        assert_eq!(
            parse_event(&failed).unwrap().action,
            WebhookAction::PaymentFailed {
                customer_id: "cus_7".to_string(),
                subscription_id: Some("sub_7".to_string()),
            }
        );

        let other = br#"{"id":"evt_3","type":"charge.refunded","data":{"object":{}}}"#;
        assert_eq!(
            parse_event(other).unwrap().action,
            WebhookAction::Ignored("charge.refunded".to_string())
        );
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_event(b"not json"), Err(WebhookError::InvalidPayload(_))));
    }
}
