// libs/appointment-cell/src/services/integrations.rs
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use calendar_cell::{CalendarProvider, GoogleCalendarProvider};
use payment_cell::{PaymentProvider, StripePaymentProvider};
use shared_config::AppConfig;
use video_conferencing_cell::{MeetingProvider, ZoomMeetingProvider};

/// Providers configured for one clinic. Any of them may be absent.
#[derive(Clone, Default)]
pub struct ClinicIntegrations {
    pub payment: Option<Arc<dyn PaymentProvider>>,
    pub meeting: Option<Arc<dyn MeetingProvider>>,
    pub calendar: Option<Arc<dyn CalendarProvider>>,
}

impl ClinicIntegrations {
    pub fn with_payment(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.payment = Some(provider);
        self
    }

    pub fn with_meeting(mut self, provider: Arc<dyn MeetingProvider>) -> Self {
        self.meeting = Some(provider);
        self
    }

    pub fn with_calendar(mut self, provider: Arc<dyn CalendarProvider>) -> Self {
        self.calendar = Some(provider);
        self
    }
}

pub trait IntegrationRegistry: Send + Sync {
    fn integrations_for(&self, clinic_id: Uuid) -> ClinicIntegrations;

    /// Provider whose signing secret authenticates incoming payment webhooks.
    fn webhook_provider(&self) -> Option<Arc<dyn PaymentProvider>>;
}

/// Registry with a deployment-wide default and optional per-clinic overrides.
#[derive(Clone, Default)]
pub struct StaticIntegrationRegistry {
    default: ClinicIntegrations,
    clinics: HashMap<Uuid, ClinicIntegrations>,
}

impl StaticIntegrationRegistry {
    pub fn new(default: ClinicIntegrations) -> Self {
        Self {
            default,
            clinics: HashMap::new(),
        }
    }

    pub fn with_clinic(mut self, clinic_id: Uuid, integrations: ClinicIntegrations) -> Self {
        self.clinics.insert(clinic_id, integrations);
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut default = ClinicIntegrations::default();

        match StripePaymentProvider::new(config) {
            Ok(provider) => {
                info!("Payment provider enabled: stripe");
                default.payment = Some(Arc::new(provider));
            }
            Err(e) => warn!("Payment provider disabled: {}", e),
        }

        match ZoomMeetingProvider::new(config) {
            Ok(provider) => {
                info!("Meeting provider enabled: zoom");
                default.meeting = Some(Arc::new(provider));
            }
            Err(e) => info!("Meeting provider disabled: {}", e),
        }

        match GoogleCalendarProvider::new(config) {
            Ok(provider) => {
                info!("Calendar provider enabled: google");
                default.calendar = Some(Arc::new(provider));
            }
            Err(e) => info!("Calendar provider disabled: {}", e),
        }

        Self::new(default)
    }
}

impl IntegrationRegistry for StaticIntegrationRegistry {
    fn integrations_for(&self, clinic_id: Uuid) -> ClinicIntegrations {
        self.clinics
            .get(&clinic_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    fn webhook_provider(&self) -> Option<Arc<dyn PaymentProvider>> {
        self.default.payment.clone()
    }
}
