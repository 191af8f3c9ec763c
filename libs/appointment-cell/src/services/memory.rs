// libs/appointment-cell/src/services/memory.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, Client, Clinician, LedgerEntry, NewClient, NewReceipt, Receipt,
    Service, StoreError,
};
use crate::services::store::{
    AppointmentStore, ClientDirectory, ClinicianDirectory, ReceiptLedger, ServiceCatalog,
};
use crate::time::TimeRange;

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    clinicians: HashMap<Uuid, Clinician>,
    clients: HashMap<Uuid, Client>,
    services: HashMap<Uuid, Service>,
    // keyed by appointment id
    receipts: HashMap<Uuid, Receipt>,
}

/// Single-process implementation of every booking collaborator.
///
/// The overlap check in `create` runs under the write lock, so it is the
/// in-memory counterpart of the database exclusion constraint.
#[derive(Default)]
pub struct InMemoryBookingRepository {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every appointment and receipt write fail with `StoreError::Backend`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }

    pub async fn insert_clinician(&self, clinician: Clinician) {
        self.tables.write().await.clinicians.insert(clinician.id, clinician);
    }

    pub async fn insert_client(&self, client: Client) {
        self.tables.write().await.clients.insert(client.id, client);
    }

    pub async fn insert_service(&self, service: Service) {
        self.tables.write().await.services.insert(service.id, service);
    }

    /// Seeds an appointment without the overlap check.
    pub async fn insert_appointment(&self, appointment: Appointment) {
        self.tables.write().await.appointments.insert(appointment.id, appointment);
    }

    pub async fn appointments(&self) -> Vec<Appointment> {
        self.tables.read().await.appointments.values().cloned().collect()
    }

    pub async fn receipt_count(&self) -> usize {
        self.tables.read().await.receipts.len()
    }

    pub async fn client_count(&self) -> usize {
        self.tables.read().await.clients.len()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryBookingRepository {
    async fn create(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;

        let overlapping = tables.appointments.values().find(|existing| {
            existing.clinician_id == appointment.clinician_id
                && existing.occupies_slot()
                && existing.slot.overlaps(&appointment.slot)
        });

        if let Some(existing) = overlapping {
            return Err(StoreError::Conflict(format!(
                "clinician {} already booked by appointment {}",
                appointment.clinician_id, existing.id
            )));
        }

        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn find_by_booking_token(&self, token: &str) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .appointments
            .values()
            .find(|a| a.booking_token == token)
            .cloned())
    }

    async fn find_by_payment_session(&self, session_id: &str) -> Result<Option<Appointment>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .appointments
            .values()
            .find(|a| a.payment_session_id == session_id)
            .cloned())
    }

    async fn list_in_window(
        &self,
        clinician_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<Appointment>, StoreError> {
        let tables = self.tables.read().await;
        let mut found: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| a.clinician_id == clinician_id && a.slot.overlaps(window))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.start_time());
        Ok(found)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        next: AppointmentStatus,
        payment_reference: Option<&str>,
    ) -> Result<Option<Appointment>, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;

        let appointment = tables
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", id)))?;

        if !expected.contains(&appointment.status) {
            debug!(
                "Status of {} is {}, expected one of {:?}",
                id, appointment.status, expected
            );
            return Ok(None);
        }

        appointment.status = next;
        if let Some(reference) = payment_reference {
            appointment.payment_reference = Some(reference.to_string());
        }
        appointment.updated_at = Utc::now();

        Ok(Some(appointment.clone()))
    }
}

#[async_trait]
impl ClinicianDirectory for InMemoryBookingRepository {
    async fn get_clinician(&self, id: Uuid) -> Result<Option<Clinician>, StoreError> {
        Ok(self.tables.read().await.clinicians.get(&id).cloned())
    }

    async fn find_by_share_token(&self, share_token: &str) -> Result<Option<Clinician>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .clinicians
            .values()
            .find(|c| c.share_token.as_deref() == Some(share_token))
            .cloned())
    }
}

#[async_trait]
impl ClientDirectory for InMemoryBookingRepository {
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        Ok(self.tables.read().await.clients.get(&id).cloned())
    }

    async fn find_by_email(&self, clinic_id: Uuid, email: &str) -> Result<Option<Client>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .clients
            .values()
            .find(|c| {
                c.clinic_id == clinic_id
                    && c.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn create_client(&self, client: &NewClient) -> Result<Client, StoreError> {
        let created = Client {
            id: Uuid::new_v4(),
            clinic_id: client.clinic_id,
            name: client.name.clone(),
            email: Some(client.email.clone()),
        };
        self.tables.write().await.clients.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryBookingRepository {
    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, StoreError> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }
}

#[async_trait]
impl ReceiptLedger for InMemoryBookingRepository {
    async fn record(&self, receipt: &NewReceipt) -> Result<LedgerEntry, StoreError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.receipts.get(&receipt.appointment_id) {
            return Ok(LedgerEntry::AlreadyRecorded(existing.clone()));
        }

        let created = Receipt {
            id: Uuid::new_v4(),
            appointment_id: receipt.appointment_id,
            payment_reference: receipt.payment_reference.clone(),
            amount_cents: receipt.amount_cents,
            currency: receipt.currency.clone(),
            issued_at: Utc::now(),
        };
        tables.receipts.insert(receipt.appointment_id, created.clone());
        Ok(LedgerEntry::Created(created))
    }

    async fn find_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Receipt>, StoreError> {
        Ok(self.tables.read().await.receipts.get(&appointment_id).cloned())
    }
}
