// libs/appointment-cell/src/services/notification.rs
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    BookingConfirmed {
        appointment_id: Uuid,
        recipient: Option<String>,
        start_time: DateTime<Utc>,
        join_url: Option<String>,
    },
    BookingCancelled {
        appointment_id: Uuid,
        recipient: Option<String>,
        start_time: DateTime<Utc>,
    },
}

impl Notification {
    pub fn appointment_id(&self) -> Uuid {
        match self {
            Notification::BookingConfirmed { appointment_id, .. }
            | Notification::BookingCancelled { appointment_id, .. } => *appointment_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Notification::BookingConfirmed { .. } => "booking_confirmed",
            Notification::BookingCancelled { .. } => "booking_cancelled",
        }
    }
}

/// Delivery is always best-effort from the booking flow's point of view.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), StoreError>;
}

/// Queues notifications in a Supabase outbox table for the mailer to pick up.
pub struct SupabaseNotificationOutbox {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseNotificationOutbox {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl NotificationSender for SupabaseNotificationOutbox {
    async fn send(&self, notification: &Notification) -> Result<(), StoreError> {
        debug!(
            "Queueing {} notification for appointment {}",
            notification.kind(),
            notification.appointment_id()
        );

        let payload = serde_json::to_value(notification)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        self.supabase
            .execute(
                Method::POST,
                "/rest/v1/notification_outbox",
                Some(json!({
                    "kind": notification.kind(),
                    "appointment_id": notification.appointment_id(),
                    "payload": payload,
                    "created_at": Utc::now().to_rfc3339()
                })),
            )
            .await?;

        Ok(())
    }
}

/// Keeps sent notifications in memory; used for local runs and tests.
#[derive(Default)]
pub struct RecordingNotificationSender {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSender for RecordingNotificationSender {
    async fn send(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| StoreError::Backend("notification log poisoned".to_string()))?;
        sent.push(notification.clone());
        Ok(())
    }
}
