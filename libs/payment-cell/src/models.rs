use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayableLinkRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    /// Carried as provider metadata so events can be correlated back.
    pub booking_token: String,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayableLink {
    pub session_id: String,
    pub url: String,
}

/// How a provider event points back at an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CorrelationKey {
    PaymentSession(String),
    BookingToken(String),
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKey::PaymentSession(id) => write!(f, "payment_session:{}", id),
            CorrelationKey::BookingToken(token) => write!(f, "booking_token:{}", token),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEventData {
    pub event_id: String,
    pub correlation: CorrelationKey,
    /// Provider-side payment identifier (payment intent or session id).
    pub payment_reference: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
}

/// Provider events the booking flow consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PaymentEvent {
    CheckoutCompleted(PaymentEventData),
    PaymentSucceeded(PaymentEventData),
    PaymentFailed(PaymentEventData),
    ChargeRefunded(PaymentEventData),
}

impl PaymentEvent {
    pub fn data(&self) -> &PaymentEventData {
        match self {
            PaymentEvent::CheckoutCompleted(data)
            | PaymentEvent::PaymentSucceeded(data)
            | PaymentEvent::PaymentFailed(data)
            | PaymentEvent::ChargeRefunded(data) => data,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            PaymentEvent::CheckoutCompleted(_) => "checkout_completed",
            PaymentEvent::PaymentSucceeded(_) => "payment_succeeded",
            PaymentEvent::PaymentFailed(_) => "payment_failed",
            PaymentEvent::ChargeRefunded(_) => "charge_refunded",
        }
    }
}

/// A verified webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Payment(PaymentEvent),
    Unsupported {
        event_id: String,
        event_type: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider not configured")]
    NotConfigured,

    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid payment provider response: {0}")]
    InvalidResponse(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Unavailable(_))
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Unavailable(err.to_string())
    }
}
