// libs/video-conferencing-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetingRequest {
    pub topic: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub agenda: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetingHandle {
    pub meeting_id: String,
    pub join_url: String,
    pub host_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum MeetingError {
    #[error("Meeting provider not configured")]
    NotConfigured,

    #[error("Meeting not found: {0}")]
    NotFound(String),

    #[error("Meeting provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Meeting provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid meeting provider response: {0}")]
    InvalidResponse(String),
}

impl MeetingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, MeetingError::Unavailable(_))
    }
}

impl From<reqwest::Error> for MeetingError {
    fn from(err: reqwest::Error) -> Self {
        MeetingError::Unavailable(err.to_string())
    }
}
