// libs/appointment-cell/src/services/mod.rs

pub mod booking;
pub mod cancellation;
pub mod conflict;
pub mod integrations;
pub mod locks;
pub mod memory;
pub mod notification;
pub mod payment_events;
pub mod store;
pub mod supabase;

use std::sync::Arc;

use crate::time::{Clock, SystemClock};

pub use booking::BookingOrchestrator;
pub use cancellation::CancellationService;
pub use conflict::ConflictChecker;
pub use integrations::{ClinicIntegrations, IntegrationRegistry, StaticIntegrationRegistry};
pub use locks::ClinicianLocks;
pub use memory::InMemoryBookingRepository;
pub use notification::{Notification, NotificationSender, RecordingNotificationSender, SupabaseNotificationOutbox};
pub use payment_events::PaymentEventProcessor;
pub use store::{AppointmentStore, ClientDirectory, ClinicianDirectory, ReceiptLedger, ServiceCatalog};
pub use supabase::SupabaseBookingRepository;

/// Everything the booking services talk to, behind trait objects.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn AppointmentStore>,
    pub clinicians: Arc<dyn ClinicianDirectory>,
    pub clients: Arc<dyn ClientDirectory>,
    pub services: Arc<dyn ServiceCatalog>,
    pub receipts: Arc<dyn ReceiptLedger>,
    pub notifications: Arc<dyn NotificationSender>,
    pub integrations: Arc<dyn IntegrationRegistry>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Wires a single repository that implements every directory.
    pub fn from_repository<R>(
        repository: Arc<R>,
        notifications: Arc<dyn NotificationSender>,
        integrations: Arc<dyn IntegrationRegistry>,
    ) -> Self
    where
        R: AppointmentStore
            + ClinicianDirectory
            + ClientDirectory
            + ServiceCatalog
            + ReceiptLedger
            + 'static,
    {
        Self {
            store: repository.clone(),
            clinicians: repository.clone(),
            clients: repository.clone(),
            services: repository.clone(),
            receipts: repository,
            notifications,
            integrations,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
