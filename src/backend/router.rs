use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::backend::AppState;
use crate::backend::handlers::{
    finalize_handler, health_handler, initiate_payment_handler, open_slots_handler,
    priced_tiers_handler, quote_handler, show_booking_handler, show_session_handler,
    start_session_handler, visitor_info_handler,
};

pub fn build_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", routing::get(health_handler))
        .route("/services/:uuid/sessions", routing::post(start_session_handler))
        .route("/services/:uuid/tiers", routing::get(priced_tiers_handler))
        .route("/services/:uuid/slots", routing::get(open_slots_handler))
        .route("/services/:uuid/quote", routing::post(quote_handler))
        .route("/sessions/:session_id", routing::get(show_session_handler))
        .route(
            "/sessions/:session_id/visitor-info",
            routing::put(visitor_info_handler),
        )
        .route(
            "/sessions/:session_id/initiate-payment",
            routing::post(initiate_payment_handler),
        )
        .route("/sessions/:session_id/finalize", routing::post(finalize_handler))
        .route("/bookings/:reference", routing::get(show_booking_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
