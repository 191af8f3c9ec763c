// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use calendar_cell::CalendarError;
use payment_cell::PaymentError;
use shared_database::SupabaseError;
use video_conferencing_cell::MeetingError;

use crate::time::TimeRange;

pub const MAX_NOTE_LENGTH: usize = 2000;
pub const BOOKING_TOKEN_LENGTH: usize = 32;

// ==============================================================================
// APPOINTMENT AGGREGATE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    /// Unguessable public handle, also sent to the payment provider as metadata.
    pub booking_token: String,
    pub clinic_id: Uuid,
    pub clinician_id: Uuid,
    pub client_id: Uuid,
    /// `None` for bookings made through a public share link.
    pub created_by_actor_id: Option<Uuid>,
    pub service_id: Uuid,
    #[serde(flatten)]
    pub slot: TimeRange,
    pub status: AppointmentStatus,
    pub meeting_type: MeetingType,
    pub price_cents: i64,
    pub currency: String,
    pub note: Option<String>,
    pub payment_session_id: String,
    pub payment_reference: Option<String>,
    pub meeting_id: Option<String>,
    pub meeting_join_url: Option<String>,
    pub meeting_host_url: Option<String>,
    pub calendar_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn start_time(&self) -> DateTime<Utc> {
        self.slot.start()
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.slot.end()
    }

    /// Whether the appointment holds its slot on the clinician's schedule.
    pub fn occupies_slot(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
    Failed,
}

impl AppointmentStatus {
    /// Pending, scheduled and completed appointments block the slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Scheduled | AppointmentStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Failed
        )
    }

    /// Forward-only lifecycle; cancellation is reachable from any non-terminal state.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;

        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Scheduled, Cancelled)
                | (Scheduled, Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    InPerson,
    Video,
}

impl fmt::Display for MeetingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeetingType::InPerson => write!(f, "in_person"),
            MeetingType::Video => write!(f, "video"),
        }
    }
}

// ==============================================================================
// SUPPORTING RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clinician {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    /// Token embedded in the clinician's public booking link.
    pub share_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewClient {
    pub clinic_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub payment_reference: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReceipt {
    pub appointment_id: Uuid,
    pub payment_reference: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
}

/// Result of recording a receipt in a ledger that holds one per appointment.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEntry {
    Created(Receipt),
    AlreadyRecorded(Receipt),
}

impl LedgerEntry {
    pub fn receipt(&self) -> &Receipt {
        match self {
            LedgerEntry::Created(receipt) | LedgerEntry::AlreadyRecorded(receipt) => receipt,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, LedgerEntry::Created(_))
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub clinician_id: Uuid,
    pub client_id: Uuid,
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub meeting_type: MeetingType,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDetails {
    pub name: String,
    pub email: String,
}

/// Booking made through a clinician's share link, without an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicBookingRequest {
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub meeting_type: MeetingType,
    pub note: Option<String>,
    pub client: ClientDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Provisioned { id: String },
    Skipped { reason: String },
    Failed { reason: String },
}

impl StepOutcome {
    pub fn from_result<T>(
        result: &Result<T, AuxiliaryError>,
        id_of: impl Fn(&T) -> String,
    ) -> Self {
        match result {
            Ok(handle) => StepOutcome::Provisioned { id: id_of(handle) },
            Err(AuxiliaryError::NotApplicable(reason)) => StepOutcome::Skipped {
                reason: reason.to_string(),
            },
            Err(e) => StepOutcome::Failed { reason: e.to_string() },
        }
    }

    pub fn is_provisioned(&self) -> bool {
        matches!(self, StepOutcome::Provisioned { .. })
    }
}

/// What happened to the optional booking steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisioningReport {
    pub meeting: StepOutcome,
    pub calendar: StepOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub payment_url: String,
    pub provisioning: ProvisioningReport,
}

/// Appointment fields that are safe to show to anyone holding the booking token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicBookingView {
    pub id: Uuid,
    pub status: AppointmentStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub meeting_type: MeetingType,
    pub meeting_join_url: Option<String>,
    pub price_cents: i64,
    pub currency: String,
}

impl From<&Appointment> for PublicBookingView {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            status: appointment.status,
            start_time: appointment.start_time(),
            end_time: appointment.end_time(),
            meeting_type: appointment.meeting_type,
            meeting_join_url: appointment.meeting_join_url.clone(),
            price_cents: appointment.price_cents,
            currency: appointment.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Uuid>,
}

/// Result of applying one payment event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Applied {
        appointment_id: Uuid,
        status: AppointmentStatus,
    },
    NoOp {
        appointment_id: Uuid,
        status: AppointmentStatus,
    },
    Unmatched,
    Ignored,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Slot no longer available")]
    Conflict,

    #[error("Payment setup failed: {0}")]
    PaymentProvider(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => BookingError::Conflict,
            StoreError::NotFound(what) => BookingError::NotFound(what),
            StoreError::Backend(message) => BookingError::Store(message),
        }
    }
}

impl From<PaymentError> for BookingError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotConfigured => {
                BookingError::PaymentProvider("clinic has no payment provider".to_string())
            }
            other => BookingError::PaymentProvider(other.to_string()),
        }
    }
}

/// Failure of an optional provisioning step. Never surfaced to callers.
#[derive(Error, Debug)]
pub enum AuxiliaryError {
    #[error("not applicable: {0}")]
    NotApplicable(&'static str),

    #[error(transparent)]
    Meeting(#[from] MeetingError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Overlapping active appointment: {0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Backend(String),
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Conflict(message) => StoreError::Conflict(message),
            SupabaseError::NotFound(message) => StoreError::NotFound(message),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum PaymentEventError {
    #[error("Webhook signature rejected: {0}")]
    InvalidSignature(String),

    #[error("Webhook payload rejected: {0}")]
    InvalidPayload(String),

    #[error("No payment provider configured for webhooks")]
    NotConfigured,

    /// The provider should redeliver the event.
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl From<StoreError> for PaymentEventError {
    fn from(err: StoreError) -> Self {
        PaymentEventError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_lifecycle_transitions() {
        assert!(Pending.can_transition_to(Scheduled));
        assert!(Pending.can_transition_to(Failed));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(Scheduled.can_transition_to(Completed));

        assert!(!Scheduled.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Failed.can_transition_to(Scheduled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn test_active_statuses_occupy_slots() {
        assert!(Pending.is_active() && Scheduled.is_active() && Completed.is_active());
        assert!(!Cancelled.is_active());
        assert!(!Failed.is_active());
        assert!(Completed.is_terminal());
    }

    #[test]
    fn test_store_conflict_becomes_booking_conflict() {
        let err: BookingError = StoreError::Conflict("exclusion".into()).into();
        assert!(matches!(err, BookingError::Conflict));
    }
}
