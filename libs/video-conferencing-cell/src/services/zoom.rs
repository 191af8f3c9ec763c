// libs/video-conferencing-cell/src/services/zoom.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_utils::RetryPolicy;

use crate::models::{MeetingError, MeetingHandle, MeetingRequest};
use crate::services::MeetingProvider;

// Zoom meeting type 2 is a one-off scheduled meeting.
const SCHEDULED_MEETING: u8 = 2;

#[derive(Debug, Deserialize)]
struct ZoomMeetingResponse {
    id: Value,
    join_url: String,
    start_url: Option<String>,
}

/// Zoom Meetings API client.
/// Based on: https://developers.zoom.us/docs/api/meetings/
#[derive(Debug)]
pub struct ZoomMeetingProvider {
    client: Client,
    api_token: String,
    base_url: String,
    retry: RetryPolicy,
}

impl ZoomMeetingProvider {
    pub fn new(config: &AppConfig) -> Result<Self, MeetingError> {
        if !config.is_meeting_configured() {
            return Err(MeetingError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            api_token: config.zoom_api_token.clone(),
            base_url: config.zoom_base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(config.external_call_max_attempts),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post_meeting(&self, url: &str, body: &Value) -> Result<String, MeetingError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        debug!("Zoom meeting creation response: {} - {}", status, response_text);

        if !status.is_success() {
            return Err(status_error(status, response_text));
        }

        Ok(response_text)
    }

    async fn send_delete(&self, url: &str, meeting_id: &str) -> Result<(), MeetingError> {
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MeetingError::NotFound(meeting_id.to_string()));
        }

        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, response_text));
        }

        Ok(())
    }
}

fn status_error(status: StatusCode, response_text: String) -> MeetingError {
    if status.is_server_error() {
        warn!("Zoom unavailable: {} - {}", status, response_text);
        MeetingError::Unavailable(format!("HTTP {}: {}", status, response_text))
    } else {
        error!("Zoom rejected request: {} - {}", status, response_text);
        MeetingError::Rejected {
            status: status.as_u16(),
            message: response_text,
        }
    }
}

fn meeting_id_from(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl MeetingProvider for ZoomMeetingProvider {
    fn name(&self) -> &'static str {
        "zoom"
    }

    async fn create_meeting(&self, request: &MeetingRequest) -> Result<MeetingHandle, MeetingError> {
        info!("Creating Zoom meeting starting at {}", request.start_time);

        let url = format!("{}/users/me/meetings", self.base_url);
        let body = json!({
            "topic": request.topic,
            "type": SCHEDULED_MEETING,
            "start_time": request.start_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "duration": request.duration_minutes,
            "timezone": "UTC",
            "agenda": request.agenda,
            "settings": {
                "join_before_host": false,
                "waiting_room": true
            }
        });

        let response_text = self
            .retry
            .run(
                "zoom.create_meeting",
                || self.post_meeting(&url, &body),
                MeetingError::is_retryable,
            )
            .await?;

        let meeting: ZoomMeetingResponse = serde_json::from_str(&response_text)
            .map_err(|e| MeetingError::InvalidResponse(format!("Failed to parse meeting: {}", e)))?;

        let meeting_id = meeting_id_from(&meeting.id)
            .ok_or_else(|| MeetingError::InvalidResponse("meeting id missing".to_string()))?;

        info!("Created Zoom meeting: {}", meeting_id);
        Ok(MeetingHandle {
            meeting_id,
            join_url: meeting.join_url,
            host_url: meeting.start_url,
        })
    }

    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), MeetingError> {
        info!("Deleting Zoom meeting: {}", meeting_id);

        let url = format!("{}/meetings/{}", self.base_url, meeting_id);

        self.retry
            .run(
                "zoom.delete_meeting",
                || self.send_delete(&url, meeting_id),
                MeetingError::is_retryable,
            )
            .await
    }
}
