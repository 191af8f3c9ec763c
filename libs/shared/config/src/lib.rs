use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_base_url: String,
    pub payment_success_url: String,
    pub payment_cancel_url: String,
    pub zoom_api_token: String,
    pub zoom_base_url: String,
    pub google_calendar_token: String,
    pub google_calendar_id: String,
    pub google_calendar_base_url: String,
    pub booking_timeout_seconds: u64,
    pub external_call_max_attempts: u32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: required_var("SUPABASE_URL"),
            supabase_anon_key: required_var("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_service_role_key: required_var("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: required_var("SUPABASE_JWT_SECRET"),
            stripe_secret_key: required_var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: required_var("STRIPE_WEBHOOK_SECRET"),
            stripe_base_url: var_or_default("STRIPE_BASE_URL", "https://api.stripe.com"),
            payment_success_url: var_or_default(
                "PAYMENT_SUCCESS_URL",
                "http://localhost:3000/bookings/payment/success",
            ),
            payment_cancel_url: var_or_default(
                "PAYMENT_CANCEL_URL",
                "http://localhost:3000/bookings/payment/cancelled",
            ),
            zoom_api_token: optional_var("ZOOM_API_TOKEN"),
            zoom_base_url: var_or_default("ZOOM_BASE_URL", "https://api.zoom.us/v2"),
            google_calendar_token: optional_var("GOOGLE_CALENDAR_TOKEN"),
            google_calendar_id: var_or_default("GOOGLE_CALENDAR_ID", "primary"),
            google_calendar_base_url: var_or_default(
                "GOOGLE_CALENDAR_BASE_URL",
                "https://www.googleapis.com/calendar/v3",
            ),
            booking_timeout_seconds: parsed_var("BOOKING_TIMEOUT_SECONDS", 30),
            external_call_max_attempts: parsed_var("EXTERNAL_CALL_MAX_ATTEMPTS", 3),
            port: parsed_var("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.is_payment_configured() {
            warn!("Stripe is not configured - every booking will be rejected");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty()
            && !self.stripe_webhook_secret.is_empty()
            && !self.stripe_base_url.is_empty()
    }

    pub fn is_meeting_configured(&self) -> bool {
        !self.zoom_api_token.is_empty() && !self.zoom_base_url.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.google_calendar_token.is_empty()
            && !self.google_calendar_id.is_empty()
            && !self.google_calendar_base_url.is_empty()
    }

    /// Key used for server-side PostgREST calls. Falls back to the anon key
    /// when no service role key is provided.
    pub fn supabase_server_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn required_var(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

// Absent optional integrations are an expected state, so no warning.
fn optional_var(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

fn var_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
