use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub stripe_base_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub zoom_base_url: String,
    pub zoom_api_token: String,
    pub google_calendar_base_url: String,
    pub google_calendar_token: String,
    pub booking_timeout_seconds: u64,
    pub external_call_max_attempts: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            stripe_base_url: "http://localhost:12111".to_string(),
            stripe_secret_key: "sk_test_123".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
            zoom_base_url: String::new(),
            zoom_api_token: String::new(),
            google_calendar_base_url: String::new(),
            google_calendar_token: String::new(),
            booking_timeout_seconds: 5,
            external_call_max_attempts: 2,
        }
    }
}

impl TestConfig {
    /// Points every external provider at the same mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            stripe_base_url: uri.to_string(),
            zoom_base_url: uri.to_string(),
            zoom_api_token: "zoom-test-token".to_string(),
            google_calendar_base_url: uri.to_string(),
            google_calendar_token: "google-test-token".to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            stripe_secret_key: self.stripe_secret_key.clone(),
            stripe_webhook_secret: self.stripe_webhook_secret.clone(),
            stripe_base_url: self.stripe_base_url.clone(),
            payment_success_url: "http://localhost:3000/bookings/payment/success".to_string(),
            payment_cancel_url: "http://localhost:3000/bookings/payment/cancelled".to_string(),
            zoom_api_token: self.zoom_api_token.clone(),
            zoom_base_url: self.zoom_base_url.clone(),
            google_calendar_token: self.google_calendar_token.clone(),
            google_calendar_id: "primary".to_string(),
            google_calendar_base_url: self.google_calendar_base_url.clone(),
            booking_timeout_seconds: self.booking_timeout_seconds,
            external_call_max_attempts: self.external_call_max_attempts,
            port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "client@example.com".to_string(),
            role: "authenticated".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn with_id(id: Uuid, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            role: "authenticated".to_string(),
        }
    }

    pub fn client(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "aud": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let signature = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
            Ok(mut mac) => {
                mac.update(signing_input.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            Err(_) => Vec::new(),
        };
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    pub fn bearer(user: &TestUser, secret: &str) -> String {
        format!("Bearer {}", Self::create_test_token(user, secret, Some(1)))
    }
}

/// Canned PostgREST rows for the booking tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn clinician_response(clinician_id: &str, clinic_id: &str) -> serde_json::Value {
        json!({
            "id": clinician_id,
            "clinic_id": clinic_id,
            "name": "Dr. Test Clinician",
            "email": "clinician@example.com",
            "share_token": "share-test-clinician"
        })
    }

    pub fn client_response(client_id: &str, clinic_id: &str) -> serde_json::Value {
        json!({
            "id": client_id,
            "clinic_id": clinic_id,
            "name": "Test Client",
            "email": "client@example.com"
        })
    }

    pub fn service_response(service_id: &str, clinic_id: &str) -> serde_json::Value {
        json!({
            "id": service_id,
            "clinic_id": clinic_id,
            "name": "Initial consultation",
            "duration_minutes": 50,
            "price_cents": 12000,
            "currency": "usd"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        clinician_id: &str,
        client_id: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "clinic_id": Uuid::nil(),
            "clinician_id": clinician_id,
            "client_id": client_id,
            "service_id": Uuid::nil(),
            "start_time": "2030-01-07T10:00:00Z",
            "end_time": "2030-01-07T10:50:00Z",
            "status": status,
            "meeting_type": "video",
            "price_cents": 12000,
            "currency": "usd",
            "note": null,
            "booking_token": "tok_test_booking",
            "payment_session_id": "cs_test_123",
            "payment_reference": null,
            "meeting_id": null,
            "meeting_join_url": null,
            "meeting_host_url": null,
            "calendar_event_id": null,
            "created_by_actor_id": null,
            "created_at": "2030-01-01T00:00:00Z",
            "updated_at": "2030-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}
