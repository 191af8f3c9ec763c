// libs/payment-cell/src/lib.rs
//! # Payment Cell
//!
//! Hosted checkout links and payment-provider webhooks for the booking flow.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                   Payment Cell                      |
//! +-----------------------------------------------------+
//! |  models.rs      |  Links, events, errors            |
//! |  services/      |                                   |
//! |    stripe.rs    |  Stripe Checkout API client       |
//! |    webhook.rs   |  Signature checks, event parsing  |
//! +-----------------------------------------------------+
//! ```
//!
//! Every booking needs a payable link before it is persisted, so a clinic
//! without a `PaymentProvider` cannot take bookings at all. Events coming back
//! from the provider are reduced to the closed `PaymentEvent` union; anything
//! else becomes `WebhookEvent::Unsupported` and is acknowledged without effect.
//!
//! ## Configuration
//!
//! - `STRIPE_SECRET_KEY` - API key used for Checkout calls
//! - `STRIPE_WEBHOOK_SECRET` - signing secret of the webhook endpoint
//! - `STRIPE_BASE_URL` - API base URL (optional, defaults to production)
//! - `PAYMENT_SUCCESS_URL` / `PAYMENT_CANCEL_URL` - checkout redirect targets

pub mod models;
pub mod services;

pub use models::{
    CorrelationKey, PayableLink, PayableLinkRequest, PaymentError, PaymentEvent,
    PaymentEventData, WebhookEvent,
};

pub use services::{PaymentProvider, StripePaymentProvider};
