use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Crate-wide error taxonomy. Variants map 1:1 onto the business failure
/// modes of the booking flow; `Database`/`Serde` cover transient or
/// programming faults and always roll the surrounding transaction back.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("this booking session has expired")]
    SessionExpired,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("the selected time slot is no longer available")]
    CapacityExceeded,

    #[error("price discrepancy detected: recomputed {expected:.2}, intent recorded {recorded:.2}")]
    PriceIntegrityViolation { expected: f64, recorded: f64 },

    #[error("payment failed: {0}")]
    PaymentFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BookingError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            BookingError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            BookingError::SessionExpired => (StatusCode::GONE, self.to_string()),
            BookingError::InvalidState(msg) => (StatusCode::CONFLICT, msg.clone()),
            BookingError::CapacityExceeded => (StatusCode::CONFLICT, self.to_string()),
            BookingError::PriceIntegrityViolation { .. } => {
                (StatusCode::CONFLICT, self.to_string())
            }
            BookingError::PaymentFailure(msg) => (StatusCode::PAYMENT_REQUIRED, msg.clone()),
            BookingError::Database(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            BookingError::Serde(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            BookingError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<config::ConfigError> for BookingError {
    fn from(err: config::ConfigError) -> Self {
        BookingError::Config(err.to_string())
    }
}
