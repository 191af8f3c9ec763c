// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, StoreError};
use crate::services::store::AppointmentStore;
use crate::time::TimeRange;

#[derive(Clone)]
pub struct ConflictChecker {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictChecker {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Active appointments of the clinician overlapping `range`.
    pub async fn find_conflicts(
        &self,
        clinician_id: Uuid,
        range: &TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        debug!(
            "Checking conflicts for clinician {} from {} to {}",
            clinician_id,
            range.start(),
            range.end()
        );

        let candidates = self.store.list_in_window(clinician_id, range).await?;

        let conflicts: Vec<Appointment> = candidates
            .into_iter()
            .filter(|existing| Some(existing.id) != exclude_appointment_id)
            .filter(|existing| existing.occupies_slot() && existing.slot.overlaps(range))
            .collect();

        if !conflicts.is_empty() {
            warn!(
                "Conflict detected for clinician {} - {} conflicting appointments",
                clinician_id,
                conflicts.len()
            );
        }

        Ok(conflicts)
    }

    pub async fn has_conflict(
        &self,
        clinician_id: Uuid,
        range: &TimeRange,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        Ok(!self
            .find_conflicts(clinician_id, range, exclude_appointment_id)
            .await?
            .is_empty())
    }
}
