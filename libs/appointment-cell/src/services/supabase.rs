// libs/appointment-cell/src/services/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{return_representation, SupabaseClient};

use crate::models::{
    Appointment, AppointmentStatus, Client, Clinician, LedgerEntry, NewClient, NewReceipt, Receipt,
    Service, StoreError,
};
use crate::services::store::{
    AppointmentStore, ClientDirectory, ClinicianDirectory, ReceiptLedger, ServiceCatalog,
};
use crate::time::TimeRange;

/// PostgREST-backed collaborators.
///
/// Double booking is also prevented in the database by an exclusion
/// constraint on `appointments (clinician_id, tstzrange(start_time, end_time))`
/// restricted to active statuses; PostgREST reports a violation as HTTP 409.
pub struct SupabaseBookingRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseBookingRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn first<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, None).await?;

        rows.into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| StoreError::Backend(format!("Failed to parse row: {}", e)))
            })
            .transpose()
    }

    async fn insert_returning<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        headers: HeaderMap,
    ) -> Result<Vec<T>, StoreError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::POST, path, Some(body), Some(headers))
            .await?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| StoreError::Backend(format!("Failed to parse row: {}", e)))
            })
            .collect()
    }
}

fn timestamp(value: chrono::DateTime<Utc>) -> String {
    urlencoding::encode(&value.to_rfc3339_opts(SecondsFormat::Secs, true)).into_owned()
}

fn status_list(statuses: &[AppointmentStatus]) -> String {
    let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
    format!("in.({})", names.join(","))
}

#[async_trait]
impl AppointmentStore for SupabaseBookingRepository {
    async fn create(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let body = serde_json::to_value(appointment)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let created: Vec<Appointment> = self
            .insert_returning("/rest/v1/appointments", body, return_representation())
            .await?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Failed to create appointment".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.first(&format!("/rest/v1/appointments?id=eq.{}&limit=1", id)).await
    }

    async fn find_by_booking_token(&self, token: &str) -> Result<Option<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?booking_token=eq.{}&limit=1",
            urlencoding::encode(token)
        );
        self.first(&path).await
    }

    async fn find_by_payment_session(&self, session_id: &str) -> Result<Option<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?payment_session_id=eq.{}&limit=1",
            urlencoding::encode(session_id)
        );
        self.first(&path).await
    }

    async fn list_in_window(
        &self,
        clinician_id: Uuid,
        window: &TimeRange,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?clinician_id=eq.{}&start_time=lt.{}&end_time=gt.{}&order=start_time.asc",
            clinician_id,
            timestamp(window.end()),
            timestamp(window.start()),
        );

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        debug!("Found {} appointments in window for clinician {}", rows.len(), clinician_id);

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| StoreError::Backend(format!("Failed to parse appointment: {}", e)))
            })
            .collect()
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        next: AppointmentStatus,
        payment_reference: Option<&str>,
    ) -> Result<Option<Appointment>, StoreError> {
        // The status filter makes the PATCH a compare-and-set: no row matches
        // once another writer has moved the appointment on.
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status={}",
            id,
            status_list(expected)
        );

        let mut update = json!({
            "status": next,
            "updated_at": Utc::now().to_rfc3339()
        });
        if let Some(reference) = payment_reference {
            update["payment_reference"] = json!(reference);
        }

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(update), Some(return_representation()))
            .await?;

        rows.into_iter()
            .next()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| StoreError::Backend(format!("Failed to parse appointment: {}", e)))
            })
            .transpose()
    }
}

#[async_trait]
impl ClinicianDirectory for SupabaseBookingRepository {
    async fn get_clinician(&self, id: Uuid) -> Result<Option<Clinician>, StoreError> {
        self.first(&format!("/rest/v1/clinicians?id=eq.{}&limit=1", id)).await
    }

    async fn find_by_share_token(&self, share_token: &str) -> Result<Option<Clinician>, StoreError> {
        let path = format!(
            "/rest/v1/clinicians?share_token=eq.{}&limit=1",
            urlencoding::encode(share_token)
        );
        self.first(&path).await
    }
}

#[async_trait]
impl ClientDirectory for SupabaseBookingRepository {
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        self.first(&format!("/rest/v1/clients?id=eq.{}&limit=1", id)).await
    }

    async fn find_by_email(&self, clinic_id: Uuid, email: &str) -> Result<Option<Client>, StoreError> {
        let path = format!(
            "/rest/v1/clients?clinic_id=eq.{}&email=ilike.{}&limit=1",
            clinic_id,
            urlencoding::encode(email)
        );
        self.first(&path).await
    }

    async fn create_client(&self, client: &NewClient) -> Result<Client, StoreError> {
        let body = json!({
            "id": Uuid::new_v4(),
            "clinic_id": client.clinic_id,
            "name": client.name,
            "email": client.email
        });

        let created: Vec<Client> = self
            .insert_returning("/rest/v1/clients", body, return_representation())
            .await?;

        created
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Failed to create client".to_string()))
    }
}

#[async_trait]
impl ServiceCatalog for SupabaseBookingRepository {
    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, StoreError> {
        self.first(&format!("/rest/v1/services?id=eq.{}&limit=1", id)).await
    }
}

#[async_trait]
impl ReceiptLedger for SupabaseBookingRepository {
    async fn record(&self, receipt: &NewReceipt) -> Result<LedgerEntry, StoreError> {
        let body = json!({
            "id": Uuid::new_v4(),
            "appointment_id": receipt.appointment_id,
            "payment_reference": receipt.payment_reference,
            "amount_cents": receipt.amount_cents,
            "currency": receipt.currency,
            "issued_at": Utc::now().to_rfc3339()
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("return=representation,resolution=ignore-duplicates"),
        );

        let created: Vec<Receipt> = self
            .insert_returning("/rest/v1/receipts?on_conflict=appointment_id", body, headers)
            .await?;

        if let Some(receipt) = created.into_iter().next() {
            return Ok(LedgerEntry::Created(receipt));
        }

        // Duplicate insert was ignored; the existing row is the receipt.
        match self.find_for_appointment(receipt.appointment_id).await? {
            Some(existing) => Ok(LedgerEntry::AlreadyRecorded(existing)),
            None => {
                warn!("Receipt insert for {} returned no row", receipt.appointment_id);
                Err(StoreError::Backend("Receipt insert returned no row".to_string()))
            }
        }
    }

    async fn find_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Receipt>, StoreError> {
        self.first(&format!(
            "/rest/v1/receipts?appointment_id=eq.{}&limit=1",
            appointment_id
        ))
        .await
    }
}
