use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::models::{CorrelationKey, PaymentError, PaymentEvent, PaymentEventData, WebhookEvent};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed delivery before it is treated as a replay.
pub const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

const BOOKING_TOKEN_KEY: &str = "booking_token";

fn mac_for(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, PaymentError> {
    let mac = mac_for(payload, secret, timestamp)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Builds a `Stripe-Signature` header value for the payload.
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, PaymentError> {
    Ok(format!("t={},v1={}", timestamp, sign_payload(payload, secret, timestamp)?))
}

pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_seconds: i64,
) -> Result<(), PaymentError> {
    if secret.is_empty() {
        return Err(PaymentError::NotConfigured);
    }

    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;

    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".to_string()));
    }

    // t= is caller-controlled, so the skew must not overflow
    let within_tolerance = now
        .checked_sub(timestamp)
        .map(|skew| skew.unsigned_abs() <= tolerance_seconds.unsigned_abs())
        .unwrap_or(false);

    if !within_tolerance {
        return Err(PaymentError::InvalidSignature(format!(
            "timestamp {} outside tolerance",
            timestamp
        )));
    }

    let mac = mac_for(payload, secret, timestamp)?;

    let matched = signatures.iter().any(|candidate| match hex::decode(candidate) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    });

    if matched {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature("signature mismatch".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: StripeObject,
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
    payment_status: Option<String>,
    payment_intent: Option<String>,
    amount_total: Option<i64>,
    amount_received: Option<i64>,
    amount_refunded: Option<i64>,
    amount: Option<i64>,
    currency: Option<String>,
}

impl StripeObject {
    fn booking_token(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get(BOOKING_TOKEN_KEY))
            .filter(|token| !token.is_empty())
            .cloned()
    }
}

/// Reduces a Stripe event to the payment events the booking flow consumes.
pub fn parse_stripe_event(payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let event: StripeEvent = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

    let StripeEvent { id: event_id, event_type, data } = event;
    let object = data.object;

    let unsupported = |reason: &str| WebhookEvent::Unsupported {
        event_id: event_id.clone(),
        event_type: event_type.clone(),
        reason: reason.to_string(),
    };

    let parsed = match event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            if object.payment_status.as_deref() == Some("unpaid") {
                return Ok(unsupported("checkout completed without payment"));
            }
            PaymentEvent::CheckoutCompleted(session_data(&event_id, &object))
        }
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            PaymentEvent::PaymentFailed(session_data(&event_id, &object))
        }
        "payment_intent.succeeded" | "payment_intent.payment_failed" | "charge.refunded" => {
            let Some(token) = object.booking_token() else {
                return Ok(unsupported("no booking token in metadata"));
            };

            let (reference, amount) = match event_type.as_str() {
                "payment_intent.succeeded" => (Some(object.id.clone()), object.amount_received),
                "payment_intent.payment_failed" => (Some(object.id.clone()), object.amount),
                _ => (
                    object.payment_intent.clone().or_else(|| Some(object.id.clone())),
                    object.amount_refunded,
                ),
            };

            let data = PaymentEventData {
                event_id: event_id.clone(),
                correlation: CorrelationKey::BookingToken(token),
                payment_reference: reference,
                amount_cents: amount,
                currency: object.currency.clone(),
            };

            match event_type.as_str() {
                "payment_intent.succeeded" => PaymentEvent::PaymentSucceeded(data),
                "payment_intent.payment_failed" => PaymentEvent::PaymentFailed(data),
                _ => PaymentEvent::ChargeRefunded(data),
            }
        }
        _ => {
            debug!("Ignoring Stripe event type {}", event_type);
            return Ok(unsupported("event type not consumed"));
        }
    };

    Ok(WebhookEvent::Payment(parsed))
}

fn session_data(event_id: &str, session: &StripeObject) -> PaymentEventData {
    let correlation = match session.booking_token() {
        Some(token) => CorrelationKey::BookingToken(token),
        None => CorrelationKey::PaymentSession(session.id.clone()),
    };

    PaymentEventData {
        event_id: event_id.to_string(),
        correlation,
        payment_reference: session
            .payment_intent
            .clone()
            .or_else(|| Some(session.id.clone())),
        amount_cents: session.amount_total,
        currency: session.currency.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_unit";

    #[test]
    fn test_signed_payload_verifies() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = signature_header(payload, SECRET, 1_700_000_000).unwrap();

        assert!(verify_signature(payload, &header, SECRET, 1_700_000_100, 300).is_ok());
    }

    #[test]
    fn test_header_with_rotated_secrets_accepts_any_matching_signature() {
        let payload = br#"{"id":"evt_2"}"#;
        let good = sign_payload(payload, SECRET, 1_700_000_000).unwrap();
        let header = format!("t=1700000000,v1={},v1={}", "00".repeat(32), good);

        assert!(verify_signature(payload, &header, SECRET, 1_700_000_000, 300).is_ok());
    }

    #[test]
    fn test_missing_parts_are_rejected() {
        let payload = b"{}";
        assert!(matches!(
            verify_signature(payload, "v1=abcd", SECRET, 0, 300),
            Err(PaymentError::InvalidSignature(_))
        ));
        assert!(matches!(
            verify_signature(payload, "t=0", SECRET, 0, 300),
            Err(PaymentError::InvalidSignature(_))
        ));
        assert!(matches!(
            verify_signature(payload, "t=0,v1=zz", "", 0, 300),
            Err(PaymentError::NotConfigured)
        ));
    }

    #[test]
    fn test_extreme_timestamps_are_rejected_without_overflow() {
        let payload = b"{}";
        for header in [
            "t=-9223372036854775000,v1=00",
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
        ] {
            assert!(matches!(
                verify_signature(payload, header, SECRET, 1_700_000_000, 300),
                Err(PaymentError::InvalidSignature(_))
            ));
        }
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let payload = br#"{"id":"evt_3"}"#;
        let header = signature_header(payload, SECRET, 1_700_000_000).unwrap();

        assert!(matches!(
            verify_signature(payload, &header, SECRET, 1_700_000_301, 300),
            Err(PaymentError::InvalidSignature(_))
        ));
    }
}
