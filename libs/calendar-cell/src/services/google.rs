// libs/calendar-cell/src/services/google.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_utils::RetryPolicy;

use crate::models::{CalendarError, CalendarEventHandle, CalendarEventRequest};
use crate::services::CalendarProvider;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventResponse {
    id: String,
    html_link: Option<String>,
}

/// Google Calendar v3 events client.
/// Based on: https://developers.google.com/calendar/api/v3/reference/events
#[derive(Debug)]
pub struct GoogleCalendarProvider {
    client: Client,
    access_token: String,
    calendar_id: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GoogleCalendarProvider {
    pub fn new(config: &AppConfig) -> Result<Self, CalendarError> {
        if !config.is_calendar_configured() {
            return Err(CalendarError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            access_token: config.google_calendar_token.clone(),
            calendar_id: config.google_calendar_id.clone(),
            base_url: config.google_calendar_base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(config.external_call_max_attempts),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    async fn post_event(&self, url: &str, body: &Value) -> Result<String, CalendarError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!("Google Calendar insert response: {} - {}", status, response_text);

        if !status.is_success() {
            return Err(status_error(status, response_text));
        }

        Ok(response_text)
    }

    async fn send_delete(&self, url: &str, event_id: &str) -> Result<(), CalendarError> {
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        // 410 Gone is returned for events that were already deleted.
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(CalendarError::NotFound(event_id.to_string()));
        }

        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, response_text));
        }

        Ok(())
    }
}

fn status_error(status: StatusCode, response_text: String) -> CalendarError {
    if status.is_server_error() {
        warn!("Google Calendar unavailable: {} - {}", status, response_text);
        CalendarError::Unavailable(format!("HTTP {}: {}", status, response_text))
    } else {
        error!("Google Calendar rejected request: {} - {}", status, response_text);
        CalendarError::Rejected {
            status: status.as_u16(),
            message: response_text,
        }
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn name(&self) -> &'static str {
        "google_calendar"
    }

    async fn create_event(
        &self,
        request: &CalendarEventRequest,
    ) -> Result<CalendarEventHandle, CalendarError> {
        info!("Creating calendar event '{}' at {}", request.summary, request.start_time);

        let url = self.events_url();
        let attendees: Vec<Value> = request
            .attendees
            .iter()
            .map(|email| json!({ "email": email }))
            .collect();

        let body = json!({
            "summary": request.summary,
            "description": request.description,
            "location": request.location,
            "start": { "dateTime": request.start_time.to_rfc3339(), "timeZone": "UTC" },
            "end": { "dateTime": request.end_time.to_rfc3339(), "timeZone": "UTC" },
            "attendees": attendees
        });

        let response_text = self
            .retry
            .run(
                "google_calendar.create_event",
                || self.post_event(&url, &body),
                CalendarError::is_retryable,
            )
            .await?;

        let event: GoogleEventResponse = serde_json::from_str(&response_text)
            .map_err(|e| CalendarError::InvalidResponse(format!("Failed to parse event: {}", e)))?;

        info!("Created calendar event: {}", event.id);
        Ok(CalendarEventHandle {
            event_id: event.id,
            html_link: event.html_link,
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        info!("Deleting calendar event: {}", event_id);

        let url = format!("{}/{}", self.events_url(), urlencoding::encode(event_id));

        self.retry
            .run(
                "google_calendar.delete_event",
                || self.send_delete(&url, event_id),
                CalendarError::is_retryable,
            )
            .await
    }
}
