// libs/video-conferencing-cell/src/services/mod.rs

pub mod zoom;

use async_trait::async_trait;

use crate::models::{MeetingError, MeetingHandle, MeetingRequest};

pub use zoom::ZoomMeetingProvider;

#[async_trait]
pub trait MeetingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_meeting(&self, request: &MeetingRequest) -> Result<MeetingHandle, MeetingError>;

    /// `MeetingError::NotFound` means the room is already gone.
    async fn delete_meeting(&self, meeting_id: &str) -> Result<(), MeetingError>;
}
