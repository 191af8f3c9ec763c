pub mod stripe;
pub mod webhook;

use async_trait::async_trait;

use crate::models::{PayableLink, PayableLinkRequest, PaymentError, WebhookEvent};

pub use stripe::StripePaymentProvider;

/// Required step of every booking: a link the client pays through.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_payable_link(
        &self,
        request: &PayableLinkRequest,
    ) -> Result<PayableLink, PaymentError>;

    /// Invalidates a link that was never handed out or is no longer wanted.
    async fn expire_payable_link(&self, session_id: &str) -> Result<(), PaymentError>;

    /// Authenticates a raw webhook delivery and parses it.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}
