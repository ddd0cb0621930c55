use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::backend::AppState;
use crate::db::models::{BookingIntentRow, IntentStatus};
use crate::domain::breakdown::PriceBreakdown;
use crate::domain::selection::Selection;
use crate::domain::snapshot::{IntentData, VisitorInfo};
use crate::pricing::engine::PricingEngine;
use crate::utils::error::BookingError;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Pass the previous session id to resume instead of starting fresh.
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: IntentStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
}

impl From<BookingIntentRow> for SessionResponse {
    fn from(row: BookingIntentRow) -> Self {
        SessionResponse {
            session_id: row.session_id,
            status: row.status,
            expires_at: row.expires_at,
            intent: row.intent_data.map(|d| d.0),
            total_amount: row.total_amount,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    /// Resume an existing session; omitted, a fresh one is opened.
    #[serde(default)]
    pub session_id: Option<String>,
    pub date: NaiveDate,
    pub slot_id: i64,
    #[serde(flatten)]
    pub selection: Selection,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Deserialize)]
pub struct TiersQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub payment_token: String,
}

pub async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    crate::db::health_check(state.repo.pool())
        .await
        .map_err(|e| BookingError::Config(e.to_string()))?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

pub async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<Uuid>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let intent = state
        .intents
        .start_or_resume(uuid, payload.session_id.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(SessionResponse::from(intent))))
}

/// The session plus the service, priced tiers and add-ons, so the booking
/// form can re-render from this response alone.
pub async fn show_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, BookingError> {
    let view = state.intents.show(&session_id).await?;

    Ok(Json(serde_json::json!({
        "session": SessionResponse::from(view.intent),
        "service": {
            "uuid": view.service.uuid,
            "name": view.service.name,
            "duration_minutes": view.service.duration_minutes,
        },
        "tiers": view.tiers,
        "add_ons": view.add_ons,
    })))
}

/// Adjusted tier prices for a date, for the booking form before any
/// quantities are chosen.
pub async fn priced_tiers_handler(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<Uuid>,
    Query(query): Query<TiersQuery>,
) -> Result<impl IntoResponse, BookingError> {
    let service = state
        .repo
        .get_service_by_uuid(uuid)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("service {uuid}")))?;

    let catalog = state.repo.load_catalog(service.id).await?;
    let tiers = PricingEngine::new(&catalog).priced_tiers_for_date(query.date);

    Ok(Json(serde_json::json!({ "date": query.date, "tiers": tiers })))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Open slots with remaining capacity over a time range.
pub async fn open_slots_handler(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<impl IntoResponse, BookingError> {
    let service = state
        .repo
        .get_service_by_uuid(uuid)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("service {uuid}")))?;

    let slots = state
        .repo
        .list_open_slots(service.id, query.from, query.to)
        .await?;

    let slots: Vec<_> = slots
        .iter()
        .map(|slot| {
            serde_json::json!({
                "id": slot.id,
                "start_time": slot.start_time,
                "end_time": slot.end_time,
                "remaining": slot.remaining(),
            })
        })
        .collect();

    Ok(Json(serde_json::json!({ "slots": slots })))
}

pub async fn quote_handler(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<Uuid>,
    Json(payload): Json<QuoteRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let (intent, breakdown) = state
        .intents
        .calculate_and_persist(
            uuid,
            payload.session_id.as_deref(),
            payload.date,
            payload.slot_id,
            &payload.selection,
        )
        .await?;

    info!(
        session_id = %intent.session_id,
        slot_id = payload.slot_id,
        total = breakdown.final_total,
        "Quote computed"
    );

    Ok(Json(QuoteResponse {
        session_id: intent.session_id,
        expires_at: intent.expires_at,
        breakdown,
    }))
}

pub async fn visitor_info_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<VisitorInfo>,
) -> Result<impl IntoResponse, BookingError> {
    let intent = state.intents.store_visitor_info(&session_id, payload).await?;
    Ok(Json(SessionResponse::from(intent)))
}

pub async fn initiate_payment_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, BookingError> {
    let token = state.finalizer.initiate_payment(&session_id).await?;
    Ok(Json(serde_json::json!({ "payment_token": token })))
}

/// Confirmation lookup by the human-shareable reference.
pub async fn show_booking_handler(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, BookingError> {
    let booking = state
        .repo
        .get_booking_by_reference(&reference)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("booking {reference}")))?;

    let add_ons = state.repo.list_booking_add_ons(booking.id).await?;

    Ok(Json(serde_json::json!({
        "booking_reference": booking.booking_reference,
        "status": booking.status,
        "total_amount": booking.total_amount,
        "snapshot": booking.booking_data_snapshot.0,
        "add_ons": add_ons,
        "created_at": booking.created_at,
    })))
}

pub async fn finalize_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(payload): Json<FinalizeRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let booking = state
        .finalizer
        .finalize(&session_id, &payload.payment_token)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "booking_reference": booking.booking_reference,
            "total_amount": booking.total_amount,
            "status": booking.status,
        })),
    ))
}
