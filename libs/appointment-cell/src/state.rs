// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::services::{
    BookingOrchestrator, CancellationService, Collaborators, PaymentEventProcessor,
    StaticIntegrationRegistry, SupabaseBookingRepository, SupabaseNotificationOutbox,
};

/// Shared state behind the booking and webhook routes.
pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub collaborators: Collaborators,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub payment_events: Arc<PaymentEventProcessor>,
    pub cancellations: Arc<CancellationService>,
}

impl BookingState {
    pub fn new(config: Arc<AppConfig>, collaborators: Collaborators) -> Self {
        Self {
            config,
            orchestrator: Arc::new(BookingOrchestrator::new(collaborators.clone())),
            payment_events: Arc::new(PaymentEventProcessor::new(collaborators.clone())),
            cancellations: Arc::new(CancellationService::new(collaborators.clone())),
            collaborators,
        }
    }

    /// Production wiring: Supabase tables plus the providers enabled in `config`.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(&config));
        let repository = Arc::new(SupabaseBookingRepository::new(supabase.clone()));
        let notifications = Arc::new(SupabaseNotificationOutbox::new(supabase));
        let integrations = Arc::new(StaticIntegrationRegistry::from_config(&config));

        let collaborators = Collaborators::from_repository(repository, notifications, integrations);
        Self::new(config, collaborators)
    }
}
