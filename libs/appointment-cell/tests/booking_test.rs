mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentStatus, BookingError, ClientDetails, MeetingType, PublicBookingRequest, StepOutcome,
};
use appointment_cell::services::{AppointmentStore, ClinicIntegrations, ConflictChecker};
use appointment_cell::time::TimeRange;
use calendar_cell::{CalendarError, CalendarEventHandle};
use payment_cell::PaymentError;
use video_conferencing_cell::MeetingError;

use common::{accepting_payments, at, meeting_handle, session_for, Fixture, MockCalendar, MockMeetings, MockPayments};

#[tokio::test]
async fn test_in_person_booking_is_pending_with_payment_url() {
    let fixture = Fixture::new().await;

    let mut meetings = MockMeetings::new();
    meetings.expect_create_meeting().times(0);

    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default()
            .with_payment(Arc::new(accepting_payments()))
            .with_meeting(Arc::new(meetings)),
    );

    let outcome = orchestrator
        .book(
            fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::InPerson),
            Some(fixture.client.id),
        )
        .await
        .unwrap();

    let appointment = &outcome.appointment;
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.end_time(), at(7, 10, 50));
    assert_eq!(appointment.price_cents, 12000);
    assert_eq!(appointment.created_by_actor_id, Some(fixture.client.id));
    assert_eq!(appointment.payment_session_id, session_for(&appointment.booking_token));
    assert_eq!(
        outcome.payment_url,
        format!("https://pay.example.com/{}", appointment.booking_token)
    );
    assert_matches!(outcome.provisioning.meeting, StepOutcome::Skipped { .. });
    assert_matches!(outcome.provisioning.calendar, StepOutcome::Skipped { .. });

    assert_eq!(fixture.repository.appointments().await.len(), 1);
}

#[tokio::test]
async fn test_video_booking_provisions_room_and_calendar_entry() {
    let fixture = Fixture::new().await;

    let mut meetings = MockMeetings::new();
    meetings
        .expect_create_meeting()
        .withf(|request| request.duration_minutes == 50)
        .times(1)
        .returning(|_| Ok(meeting_handle("9001")));

    let mut calendar = MockCalendar::new();
    calendar
        .expect_create_event()
        .withf(|request| {
            request.location.as_deref() == Some("https://zoom.example.com/j/9001")
                && request.attendees.contains(&"client@example.com".to_string())
                && request.attendees.contains(&"rivera@clinic.example.com".to_string())
        })
        .times(1)
        .returning(|_| {
            Ok(CalendarEventHandle {
                event_id: "evt_cal_1".to_string(),
                html_link: None,
            })
        });

    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default()
            .with_payment(Arc::new(accepting_payments()))
            .with_meeting(Arc::new(meetings))
            .with_calendar(Arc::new(calendar)),
    );

    let outcome = orchestrator
        .book(
            fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::Video),
            Some(fixture.client.id),
        )
        .await
        .unwrap();

    let appointment = &outcome.appointment;
    assert_eq!(appointment.meeting_id.as_deref(), Some("9001"));
    assert_eq!(
        appointment.meeting_join_url.as_deref(),
        Some("https://zoom.example.com/j/9001")
    );
    assert_eq!(appointment.calendar_event_id.as_deref(), Some("evt_cal_1"));
    assert_eq!(
        outcome.provisioning.meeting,
        StepOutcome::Provisioned { id: "9001".to_string() }
    );
    assert!(outcome.provisioning.calendar.is_provisioned());
}

#[tokio::test]
async fn test_optional_provider_failures_do_not_fail_booking() {
    let fixture = Fixture::new().await;

    let mut meetings = MockMeetings::new();
    meetings.expect_name().return_const("mock-meetings");
    meetings
        .expect_create_meeting()
        .returning(|_| Err(MeetingError::Unavailable("HTTP 503".to_string())));

    let mut calendar = MockCalendar::new();
    calendar.expect_name().return_const("mock-calendar");
    calendar.expect_create_event().returning(|_| {
        Err(CalendarError::Rejected {
            status: 403,
            message: "insufficient scope".to_string(),
        })
    });

    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default()
            .with_payment(Arc::new(accepting_payments()))
            .with_meeting(Arc::new(meetings))
            .with_calendar(Arc::new(calendar)),
    );

    let outcome = orchestrator
        .book(
            fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::Video),
            Some(fixture.client.id),
        )
        .await
        .unwrap();

    assert!(!outcome.payment_url.is_empty());
    assert_eq!(outcome.appointment.meeting_id, None);
    assert_eq!(outcome.appointment.meeting_join_url, None);
    assert_eq!(outcome.appointment.calendar_event_id, None);
    assert_matches!(outcome.provisioning.meeting, StepOutcome::Failed { .. });
    assert_matches!(outcome.provisioning.calendar, StepOutcome::Failed { .. });
}

#[tokio::test]
async fn test_payment_failure_aborts_before_optional_steps() {
    let fixture = Fixture::new().await;

    let mut payments = MockPayments::new();
    payments.expect_name().return_const("mock-payments");
    payments.expect_create_payable_link().times(1).returning(|_| {
        Err(PaymentError::Rejected {
            status: 400,
            message: "Invalid currency".to_string(),
        })
    });

    let mut meetings = MockMeetings::new();
    meetings.expect_create_meeting().times(0);
    let mut calendar = MockCalendar::new();
    calendar.expect_create_event().times(0);

    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default()
            .with_payment(Arc::new(payments))
            .with_meeting(Arc::new(meetings))
            .with_calendar(Arc::new(calendar)),
    );

    let result = orchestrator
        .book(
            fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::Video),
            Some(fixture.client.id),
        )
        .await;

    assert_matches!(result, Err(BookingError::PaymentProvider(_)));
    assert!(fixture.repository.appointments().await.is_empty());
}

#[tokio::test]
async fn test_clinic_without_payment_provider_cannot_book() {
    let fixture = Fixture::new().await;
    let orchestrator = fixture.orchestrator(ClinicIntegrations::default());

    let result = orchestrator
        .book(
            fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::InPerson),
            None,
        )
        .await;

    assert_matches!(result, Err(BookingError::PaymentProvider(_)));
    assert!(fixture.repository.appointments().await.is_empty());
}

#[tokio::test]
async fn test_overlapping_and_adjacent_slots() {
    let fixture = Fixture::new().await;
    fixture
        .seed_appointment(at(7, 10, 0), 50, AppointmentStatus::Scheduled, "existing", "cs_existing")
        .await;

    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default().with_payment(Arc::new(accepting_payments())),
    );

    // 10:30-11:00 overlaps 10:00-10:50
    let overlapping = orchestrator
        .book(fixture.request(&fixture.follow_up, at(7, 10, 30), MeetingType::InPerson), None)
        .await;
    assert_matches!(overlapping, Err(BookingError::Conflict));

    // 10:50-11:20 starts exactly when the existing one ends
    let after = orchestrator
        .book(fixture.request(&fixture.follow_up, at(7, 10, 50), MeetingType::InPerson), None)
        .await;
    assert!(after.is_ok());

    // 09:00-10:00 ends exactly when the existing one starts
    let before = orchestrator
        .book(fixture.request(&fixture.assessment, at(7, 9, 0), MeetingType::InPerson), None)
        .await;
    assert!(before.is_ok());

    assert_eq!(fixture.repository.appointments().await.len(), 3);
}

#[tokio::test]
async fn test_cancelled_and_failed_appointments_do_not_block() {
    let fixture = Fixture::new().await;
    fixture
        .seed_appointment(at(7, 10, 0), 50, AppointmentStatus::Cancelled, "gone", "cs_gone")
        .await;
    fixture
        .seed_appointment(at(7, 10, 0), 50, AppointmentStatus::Failed, "unpaid", "cs_unpaid")
        .await;

    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default().with_payment(Arc::new(accepting_payments())),
    );

    let result = orchestrator
        .book(fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::InPerson), None)
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_excluding_the_only_overlap_clears_the_conflict() {
    let fixture = Fixture::new().await;
    let existing = fixture
        .seed_appointment(at(7, 10, 0), 50, AppointmentStatus::Scheduled, "resched", "cs_resched")
        .await;

    let store: Arc<dyn AppointmentStore> = fixture.repository.clone();
    let checker = ConflictChecker::new(store);
    let moved = TimeRange::from_duration(at(7, 10, 30), 50).unwrap();

    assert!(checker
        .has_conflict(fixture.clinician.id, &moved, None)
        .await
        .unwrap());
    assert!(!checker
        .has_conflict(fixture.clinician.id, &moved, Some(existing.id))
        .await
        .unwrap());

    // excluding an unrelated id still reports the overlap
    let conflicts = checker
        .find_conflicts(fixture.clinician.id, &moved, Some(Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].id, existing.id);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_side_effects() {
    let fixture = Fixture::new().await;

    let mut payments = MockPayments::new();
    payments.expect_create_payable_link().times(0);
    let orchestrator = fixture.orchestrator(ClinicIntegrations::default().with_payment(Arc::new(payments)));

    // in the past relative to the fixed clock
    let past = orchestrator
        .book(fixture.request(&fixture.consultation, at(1, 7, 0), MeetingType::InPerson), None)
        .await;
    assert_matches!(past, Err(BookingError::Validation(_)));

    let mut long_note = fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::InPerson);
    long_note.note = Some("x".repeat(2001));
    assert_matches!(
        orchestrator.book(long_note, None).await,
        Err(BookingError::Validation(_))
    );

    let mut unknown_clinician = fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::InPerson);
    unknown_clinician.clinician_id = Uuid::new_v4();
    assert_matches!(
        orchestrator.book(unknown_clinician, None).await,
        Err(BookingError::NotFound(what)) if what == "Clinician"
    );

    let mut unknown_service = fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::InPerson);
    unknown_service.service_id = Uuid::new_v4();
    assert_matches!(
        orchestrator.book(unknown_service, None).await,
        Err(BookingError::NotFound(what)) if what == "Service"
    );
}

#[tokio::test]
async fn test_note_at_limit_is_accepted() {
    let fixture = Fixture::new().await;
    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default().with_payment(Arc::new(accepting_payments())),
    );

    let mut request = fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::InPerson);
    request.note = Some("é".repeat(2000));

    let outcome = orchestrator.book(request, None).await.unwrap();
    assert_eq!(outcome.appointment.note.map(|n| n.chars().count()), Some(2000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_for_same_slot_yield_one_success() {
    let fixture = Fixture::new().await;
    let orchestrator = Arc::new(fixture.orchestrator(
        ClinicIntegrations::default().with_payment(Arc::new(accepting_payments())),
    ));

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        // 30 minute slots starting within 15 minutes of each other all overlap
        let start = at(7, 10, (i % 4) * 5);
        let request = fixture.request(&fixture.follow_up, start, MeetingType::InPerson);
        handles.push(tokio::spawn(async move { orchestrator.book(request, None).await }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(_) => successes += 1,
            Err(BookingError::Conflict) => conflicts += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(fixture.repository.appointments().await.len(), 1);
    assert_eq!(orchestrator.locks().tracked(), 0);
}

#[tokio::test]
async fn test_persistence_failure_releases_external_resources() {
    let fixture = Fixture::new().await;
    fixture.repository.fail_writes(true);

    let mut payments = MockPayments::new();
    payments.expect_create_payable_link().returning(|request| {
        Ok(payment_cell::PayableLink {
            session_id: session_for(&request.booking_token),
            url: "https://pay.example.com/x".to_string(),
        })
    });
    payments
        .expect_expire_payable_link()
        .withf(|session_id| session_id.starts_with("cs_test_"))
        .times(1)
        .returning(|_| Ok(()));

    let mut meetings = MockMeetings::new();
    meetings.expect_create_meeting().returning(|_| Ok(meeting_handle("9002")));
    meetings
        .expect_delete_meeting()
        .withf(|id| id == "9002")
        .times(1)
        .returning(|_| Ok(()));

    let mut calendar = MockCalendar::new();
    calendar.expect_create_event().returning(|_| {
        Ok(CalendarEventHandle {
            event_id: "evt_cal_2".to_string(),
            html_link: None,
        })
    });
    // already removed on the provider side
    calendar
        .expect_delete_event()
        .withf(|id| id == "evt_cal_2")
        .times(1)
        .returning(|id| Err(CalendarError::NotFound(id.to_string())));

    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default()
            .with_payment(Arc::new(payments))
            .with_meeting(Arc::new(meetings))
            .with_calendar(Arc::new(calendar)),
    );

    let result = orchestrator
        .book(fixture.request(&fixture.consultation, at(7, 10, 0), MeetingType::Video), None)
        .await;

    assert_matches!(result, Err(BookingError::Store(_)));
    assert!(fixture.repository.appointments().await.is_empty());
}

#[tokio::test]
async fn test_public_booking_matches_client_by_email() {
    let fixture = Fixture::new().await;
    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default().with_payment(Arc::new(accepting_payments())),
    );

    let public_request = |start, email: &str| PublicBookingRequest {
        service_id: fixture.consultation.id,
        start_time: start,
        meeting_type: MeetingType::InPerson,
        note: Some("First visit".to_string()),
        client: ClientDetails {
            name: "Sam Client".to_string(),
            email: email.to_string(),
        },
    };

    let existing = orchestrator
        .book_with_share_token("share-rivera", public_request(at(7, 10, 0), "CLIENT@example.com"))
        .await
        .unwrap();
    assert_eq!(existing.appointment.client_id, fixture.client.id);
    assert_eq!(existing.appointment.created_by_actor_id, None);
    assert_eq!(fixture.repository.client_count().await, 1);

    let newcomer = orchestrator
        .book_with_share_token("share-rivera", public_request(at(8, 10, 0), "new@example.com"))
        .await
        .unwrap();
    assert_ne!(newcomer.appointment.client_id, fixture.client.id);
    assert_eq!(fixture.repository.client_count().await, 2);
}

#[tokio::test]
async fn test_public_booking_rejects_unknown_link_and_bad_email() {
    let fixture = Fixture::new().await;
    let orchestrator = fixture.orchestrator(
        ClinicIntegrations::default().with_payment(Arc::new(accepting_payments())),
    );

    let request = |email: &str| PublicBookingRequest {
        service_id: fixture.consultation.id,
        start_time: at(7, 10, 0),
        meeting_type: MeetingType::InPerson,
        note: None,
        client: ClientDetails {
            name: "Sam".to_string(),
            email: email.to_string(),
        },
    };

    assert_matches!(
        orchestrator.book_with_share_token("no-such-link", request("sam@example.com")).await,
        Err(BookingError::NotFound(_))
    );
    assert_matches!(
        orchestrator.book_with_share_token("share-rivera", request("not-an-email")).await,
        Err(BookingError::Validation(_))
    );
    assert!(fixture.repository.appointments().await.is_empty());
}
