// libs/appointment-cell/src/services/cancellation.rs
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use calendar_cell::CalendarError;
use video_conferencing_cell::MeetingError;

use crate::models::{Appointment, AppointmentStatus, BookingError};
use crate::services::notification::Notification;
use crate::services::Collaborators;

pub struct CancellationService {
    collaborators: Collaborators,
}

impl CancellationService {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// Cancels a pending or scheduled appointment and releases what it holds
    /// with the providers. Cancelling twice returns the cancelled appointment.
    #[instrument(skip(self))]
    pub async fn cancel(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let current = self.load(appointment_id).await?;

        match current.status {
            AppointmentStatus::Cancelled => {
                debug!("Appointment {} already cancelled", appointment_id);
                return Ok(current);
            }
            AppointmentStatus::Completed | AppointmentStatus::Failed => {
                return Err(BookingError::InvalidStatusTransition {
                    from: current.status,
                    to: AppointmentStatus::Cancelled,
                });
            }
            AppointmentStatus::Pending | AppointmentStatus::Scheduled => {}
        }

        let cancelled = self
            .collaborators
            .store
            .transition_status(
                appointment_id,
                &[AppointmentStatus::Pending, AppointmentStatus::Scheduled],
                AppointmentStatus::Cancelled,
                None,
            )
            .await?;

        let Some(cancelled) = cancelled else {
            // Lost a race with a webhook or another cancel; report where it ended up.
            let latest = self.load(appointment_id).await?;
            return match latest.status {
                AppointmentStatus::Cancelled => Ok(latest),
                status => Err(BookingError::InvalidStatusTransition {
                    from: status,
                    to: AppointmentStatus::Cancelled,
                }),
            };
        };

        info!("Cancelled appointment {} (was {})", appointment_id, current.status);

        self.release_resources(&current).await;
        self.notify_cancelled(&cancelled).await;

        Ok(cancelled)
    }

    #[instrument(skip(self))]
    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let current = self.load(appointment_id).await?;

        match current.status {
            AppointmentStatus::Completed => return Ok(current),
            AppointmentStatus::Scheduled => {}
            status => {
                return Err(BookingError::InvalidStatusTransition {
                    from: status,
                    to: AppointmentStatus::Completed,
                })
            }
        }

        let completed = self
            .collaborators
            .store
            .transition_status(
                appointment_id,
                &[AppointmentStatus::Scheduled],
                AppointmentStatus::Completed,
                None,
            )
            .await?;

        match completed {
            Some(completed) => {
                info!("Completed appointment {}", appointment_id);
                Ok(completed)
            }
            None => {
                let latest = self.load(appointment_id).await?;
                if latest.status == AppointmentStatus::Completed {
                    Ok(latest)
                } else {
                    Err(BookingError::InvalidStatusTransition {
                        from: latest.status,
                        to: AppointmentStatus::Completed,
                    })
                }
            }
        }
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.collaborators
            .store
            .get(appointment_id)
            .await?
            .ok_or_else(|| BookingError::NotFound("Appointment".to_string()))
    }

    /// Best-effort teardown; failures are logged and never undo the cancellation.
    async fn release_resources(&self, appointment: &Appointment) {
        let integrations = self
            .collaborators
            .integrations
            .integrations_for(appointment.clinic_id);

        if appointment.status == AppointmentStatus::Pending {
            if let Some(payment) = integrations.payment.as_ref() {
                if let Err(e) = payment.expire_payable_link(&appointment.payment_session_id).await {
                    warn!(
                        "Failed to expire payment link {} for appointment {}: {}",
                        appointment.payment_session_id, appointment.id, e
                    );
                }
            }
        }

        if let (Some(event_id), Some(provider)) =
            (appointment.calendar_event_id.as_deref(), integrations.calendar.as_ref())
        {
            match provider.delete_event(event_id).await {
                Ok(()) | Err(CalendarError::NotFound(_)) => debug!("Removed calendar event {}", event_id),
                Err(e) => warn!("Failed to remove calendar event {}: {}", event_id, e),
            }
        }

        if let (Some(meeting_id), Some(provider)) =
            (appointment.meeting_id.as_deref(), integrations.meeting.as_ref())
        {
            match provider.delete_meeting(meeting_id).await {
                Ok(()) | Err(MeetingError::NotFound(_)) => debug!("Removed meeting {}", meeting_id),
                Err(e) => warn!("Failed to remove meeting {}: {}", meeting_id, e),
            }
        }
    }

    async fn notify_cancelled(&self, appointment: &Appointment) {
        let recipient = match self.collaborators.clients.get_client(appointment.client_id).await {
            Ok(client) => client.and_then(|c| c.email),
            Err(e) => {
                warn!("Could not load client {}: {}", appointment.client_id, e);
                None
            }
        };

        let notification = Notification::BookingCancelled {
            appointment_id: appointment.id,
            recipient,
            start_time: appointment.start_time(),
        };

        if let Err(e) = self.collaborators.notifications.send(&notification).await {
            warn!("Cancellation notice for appointment {} not sent: {}", appointment.id, e);
        }
    }
}
