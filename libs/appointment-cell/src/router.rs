// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::BookingState;

pub fn booking_routes(state: Arc<BookingState>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::book))
        .route("/conflicts/check", get(handlers::check_conflicts))
        .route(
            "/{booking_id}",
            get(handlers::get_booking).delete(handlers::cancel_booking),
        )
        .route("/{booking_id}/complete", post(handlers::complete_booking))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    // Share links and booking tokens are the credentials here
    let public_routes = Router::new()
        .route("/public/{share_token}", post(handlers::book_public))
        .route("/token/{booking_token}", get(handlers::get_booking_by_token));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
}

/// Provider callbacks, authenticated by signature instead of a JWT.
pub fn webhook_routes(state: Arc<BookingState>) -> Router {
    Router::new()
        .route("/payments", post(handlers::payment_webhook))
        .with_state(state)
}
