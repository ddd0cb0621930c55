use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::rules::{CouponDiscountType, RuleCategory};
use crate::domain::snapshot::IntentData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "service_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "slot_consumption", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SlotConsumption {
    /// Every ticket consumes one unit of slot capacity.
    PerTicket,
    /// The whole booking consumes a single unit regardless of ticket count.
    PerBooking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "addon_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AddOnType {
    PerBooking,
    PerPerson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "slot_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Open,
    Closed,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "intent_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Active,
    Expired,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

/// Variant payload for the two service kinds, stored as a tagged JSONB
/// column on `bookable_services`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceDetail {
    TicketedEvent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        venue_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
        #[serde(default)]
        requires_waiver: bool,
    },
    Appointment {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buffer_time_minutes: Option<i32>,
        #[serde(default)]
        requires_provider: bool,
    },
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// The single shared guest row; never created or destroyed per booking.
    pub is_placeholder: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookableService {
    pub id: i64,
    pub uuid: Uuid,
    pub tenant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub slot_consumption: SlotConsumption,
    pub booking_window_min_days: i32,
    pub booking_window_max_days: i32,
    pub default_capacity: i32,
    pub status: ServiceStatus,
    pub detail: Json<ServiceDetail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TicketTier {
    pub id: i64,
    pub tenant_id: i64,
    pub bookable_service_id: i64,
    pub name: String,
    pub base_price: f64,
    pub min_quantity: i64,
    pub max_quantity: Option<i64>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AddOn {
    pub id: i64,
    pub tenant_id: i64,
    pub bookable_service_id: i64,
    pub name: String,
    /// NULL when the add-on is bundled into the ticket price.
    pub price: Option<f64>,
    pub addon_type: AddOnType,
    pub is_included_in_ticket: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PricingRuleRow {
    pub id: i64,
    pub tenant_id: i64,
    pub bookable_service_id: i64,
    pub name: String,
    pub category: RuleCategory,
    pub priority: i32,
    pub is_stackable: bool,
    pub active: bool,
    pub conditions: Option<Json<serde_json::Value>>,
    pub price_modification: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CouponRow {
    pub id: i64,
    pub tenant_id: i64,
    pub bookable_service_id: i64,
    pub code: String,
    pub discount_type: CouponDiscountType,
    pub conditions: Option<Json<serde_json::Value>>,
    pub effects: Json<serde_json::Value>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OperatingHour {
    pub id: i64,
    pub tenant_id: i64,
    pub bookable_service_id: i64,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: i16,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: i64,
    pub tenant_id: i64,
    pub bookable_service_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: i32,
    pub booked_count: i32,
    pub status: SlotStatus,
}

impl AvailabilitySlot {
    pub fn remaining(&self) -> i32 {
        self.capacity - self.booked_count
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookingIntentRow {
    pub id: i64,
    pub session_id: String,
    pub tenant_id: i64,
    pub bookable_service_id: i64,
    pub customer_id: Option<i64>,
    pub intent_data: Option<Json<IntentData>>,
    pub subtotal_amount: Option<f64>,
    pub discounts_amount: Option<f64>,
    pub addons_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub status: IntentStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingIntentRow {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status != IntentStatus::Active || self.expires_at <= now
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookingRow {
    pub id: i64,
    pub booking_reference: String,
    pub tenant_id: i64,
    pub bookable_service_id: i64,
    pub customer_id: i64,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub booking_data_snapshot: Json<IntentData>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BookingAddOnRow {
    pub booking_id: i64,
    pub add_on_id: i64,
    pub quantity: i64,
    pub price_at_booking: f64,
}
