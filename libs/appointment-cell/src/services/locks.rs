// libs/appointment-cell/src/services/locks.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

type LockTable = HashMap<Uuid, Arc<AsyncMutex<()>>>;

/// Keyed async locks serialising bookings per clinician.
///
/// Entries are created on first use and removed when the last holder or
/// waiter goes away, so the table only holds clinicians with bookings in flight.
#[derive(Default, Clone)]
pub struct ClinicianLocks {
    table: Arc<Mutex<LockTable>>,
}

pub struct ClinicianGuard {
    clinician_id: Uuid,
    table: Arc<Mutex<LockTable>>,
    _guard: OwnedMutexGuard<()>,
}

fn lock_table(table: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ClinicianLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, clinician_id: Uuid) -> ClinicianGuard {
        let slot = {
            let mut table = lock_table(&self.table);
            table
                .entry(clinician_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = slot.lock_owned().await;
        debug!("Acquired booking lock for clinician {}", clinician_id);

        ClinicianGuard {
            clinician_id,
            table: self.table.clone(),
            _guard: guard,
        }
    }

    /// Number of clinicians with a booking in flight.
    pub fn tracked(&self) -> usize {
        lock_table(&self.table).len()
    }
}

impl Drop for ClinicianGuard {
    fn drop(&mut self) {
        let mut table = lock_table(&self.table);
        // One reference is the table's, one is held by our own guard.
        let idle = table
            .get(&self.clinician_id)
            .is_some_and(|slot| Arc::strong_count(slot) <= 2);
        if idle {
            table.remove(&self.clinician_id);
        }
        debug!("Released booking lock for clinician {}", self.clinician_id);
    }
}
