// libs/appointment-cell/src/services/payment_events.rs
use tracing::{debug, info, instrument, warn};

use payment_cell::{CorrelationKey, PaymentError, PaymentEvent, PaymentEventData, WebhookEvent};

use crate::models::{Appointment, AppointmentStatus, EventOutcome, NewReceipt, PaymentEventError};
use crate::services::notification::Notification;
use crate::services::Collaborators;

enum Transition {
    Unmatched,
    NoOp(Appointment),
    Applied(Appointment),
}

/// Applies payment-provider events to appointments.
///
/// Every transition is a compare-and-set on the stored status, so duplicate
/// or concurrent deliveries of the same event change the appointment once.
/// Only store failures are returned as errors; everything else is
/// acknowledged with an `EventOutcome`.
pub struct PaymentEventProcessor {
    collaborators: Collaborators,
}

impl PaymentEventProcessor {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Verifies a raw webhook delivery and applies it.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<EventOutcome, PaymentEventError> {
        let provider = self
            .collaborators
            .integrations
            .webhook_provider()
            .ok_or(PaymentEventError::NotConfigured)?;

        let event = provider
            .verify_webhook(payload, signature_header)
            .map_err(|e| match e {
                PaymentError::InvalidSignature(message) => PaymentEventError::InvalidSignature(message),
                PaymentError::InvalidPayload(message) => PaymentEventError::InvalidPayload(message),
                PaymentError::NotConfigured => PaymentEventError::NotConfigured,
                other => PaymentEventError::InvalidSignature(other.to_string()),
            })?;

        match event {
            WebhookEvent::Payment(event) => self.handle(event).await,
            WebhookEvent::Unsupported { event_id, event_type, reason } => {
                info!("Ignoring {} event {}: {}", event_type, event_id, reason);
                Ok(EventOutcome::Ignored)
            }
        }
    }

    #[instrument(skip(self, event), fields(kind = event.kind_name(), event_id = %event.data().event_id))]
    pub async fn handle(&self, event: PaymentEvent) -> Result<EventOutcome, PaymentEventError> {
        match event {
            PaymentEvent::CheckoutCompleted(data) => self.on_checkout_completed(data).await,
            PaymentEvent::PaymentSucceeded(data) => self.on_payment_succeeded(data).await,
            PaymentEvent::PaymentFailed(data) => self.on_payment_failed(data).await,
            PaymentEvent::ChargeRefunded(data) => self.on_charge_refunded(data).await,
        }
    }

    async fn on_checkout_completed(&self, data: PaymentEventData) -> Result<EventOutcome, PaymentEventError> {
        self.confirm(data).await
    }

    async fn on_payment_succeeded(&self, data: PaymentEventData) -> Result<EventOutcome, PaymentEventError> {
        self.confirm(data).await
    }

    async fn on_payment_failed(&self, data: PaymentEventData) -> Result<EventOutcome, PaymentEventError> {
        let transition = self.advance(&data, AppointmentStatus::Failed).await?;
        if let Transition::Applied(appointment) = &transition {
            warn!("Payment failed for appointment {}", appointment.id);
        }
        Ok(outcome(transition))
    }

    async fn on_charge_refunded(&self, data: PaymentEventData) -> Result<EventOutcome, PaymentEventError> {
        let transition = self.advance(&data, AppointmentStatus::Cancelled).await?;
        if let Transition::Applied(appointment) = &transition {
            info!("Appointment {} cancelled after refund", appointment.id);
        }
        Ok(outcome(transition))
    }

    /// Moves the appointment to `scheduled` and records its receipt.
    ///
    /// A redelivery that finds the appointment already scheduled records the
    /// receipt again; the ledger keeps one per appointment, so this repairs a
    /// previous delivery that failed between the transition and the receipt.
    async fn confirm(&self, data: PaymentEventData) -> Result<EventOutcome, PaymentEventError> {
        let transition = self.advance(&data, AppointmentStatus::Scheduled).await?;

        match &transition {
            Transition::Applied(appointment) => {
                info!("Appointment {} scheduled after payment", appointment.id);
                self.record_receipt(appointment, &data).await?;
            }
            Transition::NoOp(appointment) if appointment.status == AppointmentStatus::Scheduled => {
                self.record_receipt(appointment, &data).await?;
            }
            _ => {}
        }

        Ok(outcome(transition))
    }

    async fn advance(
        &self,
        data: &PaymentEventData,
        target: AppointmentStatus,
    ) -> Result<Transition, PaymentEventError> {
        let Some(appointment) = self.find(&data.correlation).await? else {
            warn!("No appointment matches {} (event {})", data.correlation, data.event_id);
            return Ok(Transition::Unmatched);
        };

        if !appointment.status.can_transition_to(target) {
            debug!(
                "Appointment {} is already {}, event {} is a no-op",
                appointment.id, appointment.status, data.event_id
            );
            return Ok(Transition::NoOp(appointment));
        }

        let updated = self
            .collaborators
            .store
            .transition_status(
                appointment.id,
                &[appointment.status],
                target,
                data.payment_reference.as_deref(),
            )
            .await?;

        match updated {
            Some(updated) => Ok(Transition::Applied(updated)),
            None => {
                // Another delivery moved the appointment first.
                let current = self
                    .collaborators
                    .store
                    .get(appointment.id)
                    .await?
                    .unwrap_or(appointment);
                debug!(
                    "Appointment {} changed concurrently to {}, event {} is a no-op",
                    current.id, current.status, data.event_id
                );
                Ok(Transition::NoOp(current))
            }
        }
    }

    async fn find(&self, correlation: &CorrelationKey) -> Result<Option<Appointment>, PaymentEventError> {
        let store = &self.collaborators.store;
        let found = match correlation {
            CorrelationKey::BookingToken(token) => store.find_by_booking_token(token).await?,
            CorrelationKey::PaymentSession(session_id) => store.find_by_payment_session(session_id).await?,
        };
        Ok(found)
    }

    async fn record_receipt(
        &self,
        appointment: &Appointment,
        data: &PaymentEventData,
    ) -> Result<(), PaymentEventError> {
        let entry = self
            .collaborators
            .receipts
            .record(&NewReceipt {
                appointment_id: appointment.id,
                payment_reference: data
                    .payment_reference
                    .clone()
                    .or_else(|| appointment.payment_reference.clone()),
                amount_cents: data.amount_cents.unwrap_or(appointment.price_cents),
                currency: data
                    .currency
                    .clone()
                    .unwrap_or_else(|| appointment.currency.clone()),
            })
            .await?;

        if !entry.is_new() {
            debug!("Receipt for appointment {} already recorded", appointment.id);
            return Ok(());
        }

        info!("Recorded receipt {} for appointment {}", entry.receipt().id, appointment.id);
        self.send_confirmation(appointment).await;
        Ok(())
    }

    async fn send_confirmation(&self, appointment: &Appointment) {
        let recipient = match self.collaborators.clients.get_client(appointment.client_id).await {
            Ok(client) => client.and_then(|c| c.email),
            Err(e) => {
                warn!("Could not load client {} for confirmation: {}", appointment.client_id, e);
                None
            }
        };

        let notification = Notification::BookingConfirmed {
            appointment_id: appointment.id,
            recipient,
            start_time: appointment.start_time(),
            join_url: appointment.meeting_join_url.clone(),
        };

        if let Err(e) = self.collaborators.notifications.send(&notification).await {
            warn!("Confirmation for appointment {} not sent: {}", appointment.id, e);
        }
    }
}

fn outcome(transition: Transition) -> EventOutcome {
    match transition {
        Transition::Unmatched => EventOutcome::Unmatched,
        Transition::NoOp(appointment) => EventOutcome::NoOp {
            appointment_id: appointment.id,
            status: appointment.status,
        },
        Transition::Applied(appointment) => EventOutcome::Applied {
            appointment_id: appointment.id,
            status: appointment.status,
        },
    }
}
