// libs/appointment-cell/src/lib.rs
//! # Appointment Cell
//!
//! Booking orchestration for the clinic: the booking saga, the payment event
//! state machine, cancellation, and the HTTP routes exposing them.
//!
//! ```text
//! +------------------------------------------------------------+
//! |                     Appointment Cell                       |
//! +------------------------------------------------------------+
//! |  handlers.rs / router.rs  |  /bookings and /webhooks routes |
//! |  state.rs                 |  Wiring of services and stores  |
//! |  models.rs / time.rs      |  Appointment, TimeRange, errors |
//! |  services/                |                                 |
//! |    booking.rs             |  Booking saga + compensation    |
//! |    payment_events.rs      |  Webhook-driven transitions     |
//! |    cancellation.rs        |  Cancel / complete              |
//! |    conflict.rs, locks.rs  |  Double-booking prevention      |
//! |    store.rs               |  Collaborator traits            |
//! |    memory.rs, supabase.rs |  Store implementations          |
//! +------------------------------------------------------------+
//! ```
//!
//! An appointment is `pending` from the moment it is stored until the payment
//! provider reports the outcome; only webhooks move it to `scheduled` or
//! `failed`.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod time;

pub use router::{booking_routes, webhook_routes};
pub use state::BookingState;
