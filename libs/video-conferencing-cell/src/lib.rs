// libs/video-conferencing-cell/src/lib.rs
//! # Video Conferencing Cell
//!
//! Provisions and tears down video rooms for `video` appointments.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                   Video Cell                        |
//! +-----------------------------------------------------+
//! |  models.rs      |  Meeting requests, handles, errors|
//! |  services/      |                                   |
//! |    zoom.rs      |  Zoom Meetings REST client        |
//! +-----------------------------------------------------+
//! ```
//!
//! Rooms are an optional booking step: a failed `create_meeting` leaves the
//! appointment without meeting fields and the booking goes ahead.
//!
//! ## Configuration
//!
//! - `ZOOM_API_TOKEN` - OAuth access token for the account
//! - `ZOOM_BASE_URL` - API base URL (optional, defaults to production)

pub mod models;
pub mod services;

pub use models::{MeetingError, MeetingHandle, MeetingRequest};
pub use services::{MeetingProvider, ZoomMeetingProvider};
