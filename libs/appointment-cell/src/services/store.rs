// libs/appointment-cell/src/services/store.rs
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, Client, Clinician, LedgerEntry, NewClient, NewReceipt, Receipt,
    Service, StoreError,
};
use crate::time::TimeRange;

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Persists a new appointment. Fails with `StoreError::Conflict` when an
    /// active appointment of the same clinician overlaps it.
    async fn create(&self, appointment: &Appointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn find_by_booking_token(&self, token: &str) -> Result<Option<Appointment>, StoreError>;

    async fn find_by_payment_session(&self, session_id: &str) -> Result<Option<Appointment>, StoreError>;

    /// Appointments of the clinician whose slot intersects `window`, any status.
    async fn list_in_window(
        &self,
        clinician_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Compare-and-set status update. Returns `None` when the current status
    /// is not one of `expected`.
    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        next: AppointmentStatus,
        payment_reference: Option<&str>,
    ) -> Result<Option<Appointment>, StoreError>;
}

#[async_trait]
pub trait ClinicianDirectory: Send + Sync {
    async fn get_clinician(&self, id: Uuid) -> Result<Option<Clinician>, StoreError>;

    async fn find_by_share_token(&self, share_token: &str) -> Result<Option<Clinician>, StoreError>;
}

#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError>;

    async fn find_by_email(&self, clinic_id: Uuid, email: &str) -> Result<Option<Client>, StoreError>;

    async fn create_client(&self, client: &NewClient) -> Result<Client, StoreError>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, StoreError>;
}

/// Receipts, at most one per appointment.
#[async_trait]
pub trait ReceiptLedger: Send + Sync {
    async fn record(&self, receipt: &NewReceipt) -> Result<LedgerEntry, StoreError>;

    async fn find_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Receipt>, StoreError>;
}
