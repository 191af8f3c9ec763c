#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentStatus, BookingRequest, Client, Clinician, MeetingType, Service,
};
use appointment_cell::services::{
    BookingOrchestrator, ClinicIntegrations, Collaborators, InMemoryBookingRepository,
    RecordingNotificationSender, StaticIntegrationRegistry,
};
use appointment_cell::time::{FixedClock, TimeRange};
use calendar_cell::{CalendarError, CalendarEventHandle, CalendarEventRequest, CalendarProvider};
use payment_cell::{PayableLink, PayableLinkRequest, PaymentError, PaymentProvider, WebhookEvent};
use video_conferencing_cell::{MeetingError, MeetingHandle, MeetingProvider, MeetingRequest};

mock! {
    pub Payments {}

    #[async_trait]
    impl PaymentProvider for Payments {
        fn name(&self) -> &'static str;
        async fn create_payable_link(&self, request: &PayableLinkRequest) -> Result<PayableLink, PaymentError>;
        async fn expire_payable_link(&self, session_id: &str) -> Result<(), PaymentError>;
        fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent, PaymentError>;
    }
}

mock! {
    pub Meetings {}

    #[async_trait]
    impl MeetingProvider for Meetings {
        fn name(&self) -> &'static str;
        async fn create_meeting(&self, request: &MeetingRequest) -> Result<MeetingHandle, MeetingError>;
        async fn delete_meeting(&self, meeting_id: &str) -> Result<(), MeetingError>;
    }
}

mock! {
    pub Calendar {}

    #[async_trait]
    impl CalendarProvider for Calendar {
        fn name(&self) -> &'static str;
        async fn create_event(&self, request: &CalendarEventRequest) -> Result<CalendarEventHandle, CalendarError>;
        async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError>;
    }
}

/// Instant every test treats as "now".
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap()
}

/// A time on a day of January 2030.
pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, day, hour, minute, 0).unwrap()
}

pub fn session_for(booking_token: &str) -> String {
    format!("cs_test_{}", booking_token)
}

/// Payment mock that hands out a link per booking token and accepts expiry.
pub fn accepting_payments() -> MockPayments {
    let mut payments = MockPayments::new();
    payments.expect_name().return_const("mock-payments");
    payments.expect_create_payable_link().returning(|request| {
        Ok(PayableLink {
            session_id: session_for(&request.booking_token),
            url: format!("https://pay.example.com/{}", request.booking_token),
        })
    });
    payments.expect_expire_payable_link().returning(|_| Ok(()));
    payments
}

pub fn meeting_handle(id: &str) -> MeetingHandle {
    MeetingHandle {
        meeting_id: id.to_string(),
        join_url: format!("https://zoom.example.com/j/{}", id),
        host_url: Some(format!("https://zoom.example.com/s/{}", id)),
    }
}

pub struct Fixture {
    pub repository: Arc<InMemoryBookingRepository>,
    pub notifications: Arc<RecordingNotificationSender>,
    pub clinic_id: Uuid,
    pub clinician: Clinician,
    pub client: Client,
    /// 50 minutes
    pub consultation: Service,
    /// 30 minutes
    pub follow_up: Service,
    /// 60 minutes
    pub assessment: Service,
}

impl Fixture {
    pub async fn new() -> Self {
        let repository = Arc::new(InMemoryBookingRepository::new());
        let clinic_id = Uuid::new_v4();

        let clinician = Clinician {
            id: Uuid::new_v4(),
            clinic_id,
            name: "Dr. Rivera".to_string(),
            email: Some("rivera@clinic.example.com".to_string()),
            share_token: Some("share-rivera".to_string()),
        };
        let client = Client {
            id: Uuid::new_v4(),
            clinic_id,
            name: "Sam Client".to_string(),
            email: Some("client@example.com".to_string()),
        };
        let consultation = service(clinic_id, "Consultation", 50, 12000);
        let follow_up = service(clinic_id, "Follow-up", 30, 6000);
        let assessment = service(clinic_id, "Assessment", 60, 15000);

        repository.insert_clinician(clinician.clone()).await;
        repository.insert_client(client.clone()).await;
        for s in [&consultation, &follow_up, &assessment] {
            repository.insert_service(s.clone()).await;
        }

        Self {
            repository,
            notifications: Arc::new(RecordingNotificationSender::new()),
            clinic_id,
            clinician,
            client,
            consultation,
            follow_up,
            assessment,
        }
    }

    pub fn collaborators(&self, integrations: ClinicIntegrations) -> Collaborators {
        Collaborators::from_repository(
            self.repository.clone(),
            self.notifications.clone(),
            Arc::new(StaticIntegrationRegistry::new(integrations)),
        )
        .with_clock(Arc::new(FixedClock(now())))
    }

    pub fn orchestrator(&self, integrations: ClinicIntegrations) -> BookingOrchestrator {
        BookingOrchestrator::new(self.collaborators(integrations))
    }

    pub fn request(&self, service: &Service, start_time: DateTime<Utc>, meeting_type: MeetingType) -> BookingRequest {
        BookingRequest {
            clinician_id: self.clinician.id,
            client_id: self.client.id,
            service_id: service.id,
            start_time,
            meeting_type,
            note: None,
        }
    }

    /// Stores an appointment directly, bypassing the saga.
    pub async fn seed_appointment(
        &self,
        start_time: DateTime<Utc>,
        minutes: i64,
        status: AppointmentStatus,
        booking_token: &str,
        payment_session_id: &str,
    ) -> Appointment {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            booking_token: booking_token.to_string(),
            clinic_id: self.clinic_id,
            clinician_id: self.clinician.id,
            client_id: self.client.id,
            created_by_actor_id: Some(self.client.id),
            service_id: self.consultation.id,
            slot: TimeRange::from_duration(start_time, minutes).unwrap(),
            status,
            meeting_type: MeetingType::InPerson,
            price_cents: self.consultation.price_cents,
            currency: self.consultation.currency.clone(),
            note: None,
            payment_session_id: payment_session_id.to_string(),
            payment_reference: None,
            meeting_id: None,
            meeting_join_url: None,
            meeting_host_url: None,
            calendar_event_id: None,
            created_at: now(),
            updated_at: now(),
        };
        self.repository.insert_appointment(appointment.clone()).await;
        appointment
    }
}

fn service(clinic_id: Uuid, name: &str, duration_minutes: i64, price_cents: i64) -> Service {
    Service {
        id: Uuid::new_v4(),
        clinic_id,
        name: name.to_string(),
        duration_minutes,
        price_cents,
        currency: "usd".to_string(),
    }
}
