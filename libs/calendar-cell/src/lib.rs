// libs/calendar-cell/src/lib.rs
//! # Calendar Cell
//!
//! Mirrors bookings into the clinician's external calendar. Like video rooms,
//! calendar entries are an optional booking step and their teardown on
//! cancellation is best-effort.

pub mod models;
pub mod services;

pub use models::{CalendarError, CalendarEventHandle, CalendarEventRequest};
pub use services::{CalendarProvider, GoogleCalendarProvider};
