// libs/appointment-cell/src/services/booking.rs
use rand::{distributions::Alphanumeric, Rng};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use calendar_cell::{CalendarError, CalendarEventHandle, CalendarEventRequest};
use payment_cell::{PayableLink, PayableLinkRequest};
use video_conferencing_cell::{MeetingError, MeetingHandle, MeetingRequest};

use crate::models::{
    Appointment, AppointmentStatus, AuxiliaryError, BookingError, BookingOutcome, BookingRequest,
    Client, Clinician, MeetingType, NewClient, ProvisioningReport, PublicBookingRequest, Service,
    StepOutcome, BOOKING_TOKEN_LENGTH, MAX_NOTE_LENGTH,
};
use crate::services::conflict::ConflictChecker;
use crate::services::integrations::ClinicIntegrations;
use crate::services::locks::ClinicianLocks;
use crate::services::Collaborators;
use crate::time::TimeRange;

pub fn generate_booking_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOOKING_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Validated inputs of one booking, resolved before any side effect.
struct BookingPlan {
    clinician: Clinician,
    client: Client,
    service: Service,
    slot: TimeRange,
    meeting_type: MeetingType,
    note: Option<String>,
    actor: Option<Uuid>,
}

/// Coordinates the booking saga:
///
/// 1. resolve and validate clinician, client and service
/// 2. take the clinician lock and check for conflicts
/// 3. create the payable link (required)
/// 4. create the video room (optional)
/// 5. create the calendar entry (optional)
/// 6. persist the `pending` appointment
///
/// The lock is held from step 2 through step 6. A failure in step 6 expires
/// the link and removes whatever steps 4 and 5 created.
pub struct BookingOrchestrator {
    collaborators: Collaborators,
    conflicts: ConflictChecker,
    locks: ClinicianLocks,
}

impl BookingOrchestrator {
    pub fn new(collaborators: Collaborators) -> Self {
        let conflicts = ConflictChecker::new(collaborators.store.clone());
        Self {
            collaborators,
            conflicts,
            locks: ClinicianLocks::new(),
        }
    }

    pub fn conflicts(&self) -> &ConflictChecker {
        &self.conflicts
    }

    pub fn locks(&self) -> &ClinicianLocks {
        &self.locks
    }

    #[instrument(skip(self, request), fields(clinician_id = %request.clinician_id))]
    pub async fn book(
        &self,
        request: BookingRequest,
        actor: Option<Uuid>,
    ) -> Result<BookingOutcome, BookingError> {
        self.validate_timing(&request.start_time, request.note.as_deref())?;

        let clinician = self.load_clinician(request.clinician_id).await?;
        let service = self.load_service(request.service_id, &clinician).await?;

        let client = self
            .collaborators
            .clients
            .get_client(request.client_id)
            .await?
            .ok_or_else(|| BookingError::NotFound("Client".to_string()))?;

        if client.clinic_id != clinician.clinic_id {
            return Err(BookingError::Validation(
                "client belongs to a different clinic".to_string(),
            ));
        }

        let slot = TimeRange::from_duration(request.start_time, service.duration_minutes)
            .map_err(|e| BookingError::Validation(e.to_string()))?;

        self.run_saga(BookingPlan {
            clinician,
            client,
            service,
            slot,
            meeting_type: request.meeting_type,
            note: request.note,
            actor,
        })
        .await
    }

    /// Books through a clinician's share link. The client is matched by email
    /// within the clinic, or created.
    #[instrument(skip_all)]
    pub async fn book_with_share_token(
        &self,
        share_token: &str,
        request: PublicBookingRequest,
    ) -> Result<BookingOutcome, BookingError> {
        self.validate_timing(&request.start_time, request.note.as_deref())?;

        let name = request.client.name.trim();
        let email = request.client.email.trim();
        if name.is_empty() {
            return Err(BookingError::Validation("client name is required".to_string()));
        }
        if !email.contains('@') {
            return Err(BookingError::Validation("client email is invalid".to_string()));
        }

        let clinician = self
            .collaborators
            .clinicians
            .find_by_share_token(share_token)
            .await?
            .ok_or_else(|| BookingError::NotFound("Booking link".to_string()))?;

        let service = self.load_service(request.service_id, &clinician).await?;

        let slot = TimeRange::from_duration(request.start_time, service.duration_minutes)
            .map_err(|e| BookingError::Validation(e.to_string()))?;

        let client = match self
            .collaborators
            .clients
            .find_by_email(clinician.clinic_id, email)
            .await?
        {
            Some(existing) => existing,
            None => {
                info!("Creating client record for public booking in clinic {}", clinician.clinic_id);
                self.collaborators
                    .clients
                    .create_client(&NewClient {
                        clinic_id: clinician.clinic_id,
                        name: name.to_string(),
                        email: email.to_string(),
                    })
                    .await?
            }
        };

        self.run_saga(BookingPlan {
            clinician,
            client,
            service,
            slot,
            meeting_type: request.meeting_type,
            note: request.note,
            actor: None,
        })
        .await
    }

    fn validate_timing(
        &self,
        start_time: &chrono::DateTime<chrono::Utc>,
        note: Option<&str>,
    ) -> Result<(), BookingError> {
        if *start_time <= self.collaborators.clock.now() {
            return Err(BookingError::Validation(
                "start time must be in the future".to_string(),
            ));
        }

        if let Some(note) = note {
            if note.chars().count() > MAX_NOTE_LENGTH {
                return Err(BookingError::Validation(format!(
                    "note must be at most {} characters",
                    MAX_NOTE_LENGTH
                )));
            }
        }

        Ok(())
    }

    async fn load_clinician(&self, clinician_id: Uuid) -> Result<Clinician, BookingError> {
        self.collaborators
            .clinicians
            .get_clinician(clinician_id)
            .await?
            .ok_or_else(|| BookingError::NotFound("Clinician".to_string()))
    }

    async fn load_service(&self, service_id: Uuid, clinician: &Clinician) -> Result<Service, BookingError> {
        let service = self
            .collaborators
            .services
            .get_service(service_id)
            .await?
            .ok_or_else(|| BookingError::NotFound("Service".to_string()))?;

        if service.clinic_id != clinician.clinic_id {
            return Err(BookingError::Validation(
                "service is not offered by this clinic".to_string(),
            ));
        }

        Ok(service)
    }

    async fn run_saga(&self, plan: BookingPlan) -> Result<BookingOutcome, BookingError> {
        let _guard = self.locks.acquire(plan.clinician.id).await;

        if self.conflicts.has_conflict(plan.clinician.id, &plan.slot, None).await? {
            info!(
                "Rejecting booking for clinician {}: slot {} - {} taken",
                plan.clinician.id,
                plan.slot.start(),
                plan.slot.end()
            );
            return Err(BookingError::Conflict);
        }

        let integrations = self
            .collaborators
            .integrations
            .integrations_for(plan.clinician.clinic_id);

        let booking_token = generate_booking_token();
        let link = self.create_payment_link(&integrations, &plan, &booking_token).await?;

        let meeting = self.provision_meeting(&integrations, &plan).await;
        let join_url = meeting.as_ref().ok().map(|handle| handle.join_url.clone());
        let calendar = self
            .provision_calendar(&integrations, &plan, join_url.as_deref())
            .await;

        let provisioning = ProvisioningReport {
            meeting: StepOutcome::from_result(&meeting, |h| h.meeting_id.clone()),
            calendar: StepOutcome::from_result(&calendar, |h| h.event_id.clone()),
        };

        let meeting = meeting.ok();
        let calendar = calendar.ok();

        let now = self.collaborators.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            booking_token,
            clinic_id: plan.clinician.clinic_id,
            clinician_id: plan.clinician.id,
            client_id: plan.client.id,
            created_by_actor_id: plan.actor,
            service_id: plan.service.id,
            slot: plan.slot,
            status: AppointmentStatus::Pending,
            meeting_type: plan.meeting_type,
            price_cents: plan.service.price_cents,
            currency: plan.service.currency.clone(),
            note: plan.note.clone(),
            payment_session_id: link.session_id.clone(),
            payment_reference: None,
            meeting_id: meeting.as_ref().map(|m| m.meeting_id.clone()),
            meeting_join_url: meeting.as_ref().map(|m| m.join_url.clone()),
            meeting_host_url: meeting.as_ref().and_then(|m| m.host_url.clone()),
            calendar_event_id: calendar.as_ref().map(|c| c.event_id.clone()),
            created_at: now,
            updated_at: now,
        };

        let stored = match self.collaborators.store.create(&appointment).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to persist appointment {}: {}", appointment.id, e);
                self.compensate(&integrations, &link, meeting.as_ref(), calendar.as_ref())
                    .await;
                return Err(e.into());
            }
        };

        info!(
            "Booked appointment {} for clinician {} ({} - {}), awaiting payment",
            stored.id,
            stored.clinician_id,
            stored.start_time(),
            stored.end_time()
        );

        Ok(BookingOutcome {
            appointment: stored,
            payment_url: link.url,
            provisioning,
        })
    }

    async fn create_payment_link(
        &self,
        integrations: &ClinicIntegrations,
        plan: &BookingPlan,
        booking_token: &str,
    ) -> Result<PayableLink, BookingError> {
        let Some(payment) = integrations.payment.as_ref() else {
            error!("Clinic {} has no payment provider", plan.clinician.clinic_id);
            return Err(BookingError::PaymentProvider(
                "clinic has no payment provider".to_string(),
            ));
        };

        let request = PayableLinkRequest {
            amount_cents: plan.service.price_cents,
            currency: plan.service.currency.clone(),
            description: format!("{} with {}", plan.service.name, plan.clinician.name),
            booking_token: booking_token.to_string(),
            customer_email: plan.client.email.clone(),
        };

        payment.create_payable_link(&request).await.map_err(|e| {
            error!("Payment link creation via {} failed: {}", payment.name(), e);
            BookingError::from(e)
        })
    }

    async fn provision_meeting(
        &self,
        integrations: &ClinicIntegrations,
        plan: &BookingPlan,
    ) -> Result<MeetingHandle, AuxiliaryError> {
        if plan.meeting_type != MeetingType::Video {
            return Err(AuxiliaryError::NotApplicable("in-person appointment"));
        }

        let Some(provider) = integrations.meeting.as_ref() else {
            return Err(AuxiliaryError::NotApplicable("no meeting provider configured"));
        };

        let request = MeetingRequest {
            topic: format!("{} with {}", plan.service.name, plan.clinician.name),
            start_time: plan.slot.start(),
            duration_minutes: plan.slot.duration_minutes(),
            agenda: None,
        };

        provider.create_meeting(&request).await.map_err(|e| {
            warn!("Meeting provisioning via {} failed, continuing without room: {}", provider.name(), e);
            AuxiliaryError::from(e)
        })
    }

    async fn provision_calendar(
        &self,
        integrations: &ClinicIntegrations,
        plan: &BookingPlan,
        join_url: Option<&str>,
    ) -> Result<CalendarEventHandle, AuxiliaryError> {
        let Some(provider) = integrations.calendar.as_ref() else {
            return Err(AuxiliaryError::NotApplicable("no calendar provider configured"));
        };

        let attendees = [plan.client.email.clone(), plan.clinician.email.clone()]
            .into_iter()
            .flatten()
            .collect();

        let request = CalendarEventRequest {
            summary: format!("{} with {}", plan.service.name, plan.client.name),
            description: plan.note.clone(),
            start_time: plan.slot.start(),
            end_time: plan.slot.end(),
            attendees,
            location: join_url.map(str::to_string),
        };

        provider.create_event(&request).await.map_err(|e| {
            warn!("Calendar provisioning via {} failed, continuing without event: {}", provider.name(), e);
            AuxiliaryError::from(e)
        })
    }

    /// Undoes the external side effects of a booking that could not be stored.
    /// The link was never returned to the client, so expiring it is enough.
    async fn compensate(
        &self,
        integrations: &ClinicIntegrations,
        link: &PayableLink,
        meeting: Option<&MeetingHandle>,
        calendar: Option<&CalendarEventHandle>,
    ) {
        if let Some(payment) = integrations.payment.as_ref() {
            match payment.expire_payable_link(&link.session_id).await {
                Ok(()) => info!("Expired payment link {}", link.session_id),
                Err(e) => warn!("Failed to expire payment link {}: {}", link.session_id, e),
            }
        }

        if let (Some(handle), Some(provider)) = (calendar, integrations.calendar.as_ref()) {
            match provider.delete_event(&handle.event_id).await {
                Ok(()) | Err(CalendarError::NotFound(_)) => {
                    debug!("Removed calendar event {}", handle.event_id)
                }
                Err(e) => warn!("Failed to remove calendar event {}: {}", handle.event_id, e),
            }
        }

        if let (Some(handle), Some(provider)) = (meeting, integrations.meeting.as_ref()) {
            match provider.delete_meeting(&handle.meeting_id).await {
                Ok(()) | Err(MeetingError::NotFound(_)) => {
                    debug!("Removed meeting {}", handle.meeting_id)
                }
                Err(e) => warn!("Failed to remove meeting {}: {}", handle.meeting_id, e),
            }
        }
    }
}
