// libs/payment-cell/src/services/stripe.rs
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_utils::RetryPolicy;

use crate::models::{PayableLink, PayableLinkRequest, PaymentError, WebhookEvent};
use crate::services::webhook::{parse_stripe_event, verify_signature, SIGNATURE_TOLERANCE_SECONDS};
use crate::services::PaymentProvider;

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

/// Stripe Checkout client.
/// Based on: https://docs.stripe.com/api/checkout/sessions
#[derive(Debug)]
pub struct StripePaymentProvider {
    client: Client,
    secret_key: String,
    webhook_secret: String,
    base_url: String,
    success_url: String,
    cancel_url: String,
    retry: RetryPolicy,
}

impl StripePaymentProvider {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payment_configured() {
            return Err(PaymentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            base_url: config.stripe_base_url.trim_end_matches('/').to_string(),
            success_url: config.payment_success_url.clone(),
            cancel_url: config.payment_cancel_url.clone(),
            retry: RetryPolicy::new(config.external_call_max_attempts),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn checkout_form(&self, request: &PayableLinkRequest) -> Vec<(String, String)> {
        let token = &request.booking_token;
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), with_token(&self.success_url, token)),
            ("cancel_url".to_string(), with_token(&self.cancel_url, token)),
            ("client_reference_id".to_string(), token.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.to_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.description.clone(),
            ),
            ("metadata[booking_token]".to_string(), token.clone()),
            (
                "payment_intent_data[metadata][booking_token]".to_string(),
                token.clone(),
            ),
        ];

        if let Some(email) = &request.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }

        form
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        idempotency_key: &str,
    ) -> Result<String, PaymentError> {
        debug!("Sending Stripe request to: {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key)
            .form(form)
            .send()
            .await?;

        read_body(response).await
    }
}

fn with_token(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}booking_token={}", base, separator, token)
}

async fn read_body(response: Response) -> Result<String, PaymentError> {
    let status = response.status();
    let response_text = response.text().await?;

    debug!("Stripe response: {} - {}", status, response_text);

    if status.is_success() {
        return Ok(response_text);
    }

    let message = serde_json::from_str::<Value>(&response_text)
        .ok()
        .and_then(|body| body["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(response_text);

    if status.is_server_error() {
        warn!("Stripe unavailable: {} - {}", status, message);
        Err(PaymentError::Unavailable(format!("HTTP {}: {}", status, message)))
    } else {
        error!("Stripe rejected request: {} - {}", status, message);
        Err(PaymentError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_payable_link(
        &self,
        request: &PayableLinkRequest,
    ) -> Result<PayableLink, PaymentError> {
        info!(
            "Creating Stripe checkout session for booking token {}",
            request.booking_token
        );

        let url = format!("{}/v1/checkout/sessions", self.base_url);
        let form = self.checkout_form(request);
        let idempotency_key = format!("checkout-{}", request.booking_token);

        let body = self
            .retry
            .run(
                "stripe.create_checkout_session",
                || self.post_form(&url, &form, &idempotency_key),
                PaymentError::is_retryable,
            )
            .await?;

        let session: CheckoutSessionResponse = serde_json::from_str(&body)
            .map_err(|e| PaymentError::InvalidResponse(format!("Failed to parse session: {}", e)))?;

        let url = session.url.ok_or_else(|| {
            PaymentError::InvalidResponse(format!("Session {} has no checkout url", session.id))
        })?;

        info!("Created Stripe checkout session: {}", session.id);
        Ok(PayableLink {
            session_id: session.id,
            url,
        })
    }

    async fn expire_payable_link(&self, session_id: &str) -> Result<(), PaymentError> {
        info!("Expiring Stripe checkout session: {}", session_id);

        let url = format!("{}/v1/checkout/sessions/{}/expire", self.base_url, session_id);
        let idempotency_key = format!("expire-{}", session_id);

        self.retry
            .run(
                "stripe.expire_checkout_session",
                || self.post_form(&url, &[], &idempotency_key),
                PaymentError::is_retryable,
            )
            .await?;

        Ok(())
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        verify_signature(
            payload,
            signature_header,
            &self.webhook_secret,
            Utc::now().timestamp(),
            SIGNATURE_TOLERANCE_SECONDS,
        )?;

        parse_stripe_event(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_urls_carry_booking_token() {
        assert_eq!(with_token("https://a.test/ok", "tok"), "https://a.test/ok?booking_token=tok");
        assert_eq!(
            with_token("https://a.test/ok?x=1", "tok"),
            "https://a.test/ok?x=1&booking_token=tok"
        );
    }
}
