// libs/calendar-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEventRequest {
    pub summary: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendees: Vec<String>,
    /// Video join URL when the appointment has a room.
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarEventHandle {
    pub event_id: String,
    pub html_link: Option<String>,
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Calendar provider not configured")]
    NotConfigured,

    #[error("Calendar event not found: {0}")]
    NotFound(String),

    #[error("Calendar provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Calendar provider unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid calendar provider response: {0}")]
    InvalidResponse(String),
}

impl CalendarError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CalendarError::Unavailable(_))
    }
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        CalendarError::Unavailable(err.to_string())
    }
}
