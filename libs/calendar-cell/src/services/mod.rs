// libs/calendar-cell/src/services/mod.rs

pub mod google;

use async_trait::async_trait;

use crate::models::{CalendarError, CalendarEventHandle, CalendarEventRequest};

pub use google::GoogleCalendarProvider;

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_event(
        &self,
        request: &CalendarEventRequest,
    ) -> Result<CalendarEventHandle, CalendarError>;

    /// `CalendarError::NotFound` means the event is already gone.
    async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError>;
}
