use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

use crate::db::models::{
    AddOn, AvailabilitySlot, BookableService, BookingAddOnRow, BookingIntentRow, BookingRow,
    CouponRow, Customer, OperatingHour, PricingRuleRow, TicketTier,
};
use crate::domain::rules::{
    ActiveCoupon, ActiveRule, CouponEffect, PriceModification, RuleCategory, RuleConditions,
};
use crate::domain::snapshot::{AddOnSnapshot, IntentData};
use crate::pricing::engine::ServiceCatalog;
use crate::utils::error::BookingError;
use crate::utils::ids;

/// How many times a booking insert retries on a reference collision
/// before giving up.
const REFERENCE_RETRIES: usize = 3;

pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- services ----

    pub async fn get_service_by_uuid(
        &self,
        uuid: Uuid,
    ) -> Result<Option<BookableService>, BookingError> {
        let service = sqlx::query_as(
            r#"
            SELECT * FROM bookable_services WHERE uuid = $1 AND status = 'active'"#,
        )
        .bind(uuid)
        .fetch_optional(self.pool())
        .await?;

        Ok(service)
    }

    pub async fn get_service(&self, id: i64) -> Result<Option<BookableService>, BookingError> {
        let service = sqlx::query_as("SELECT * FROM bookable_services WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(service)
    }

    pub async fn list_active_services(&self) -> Result<Vec<BookableService>, BookingError> {
        let services =
            sqlx::query_as("SELECT * FROM bookable_services WHERE status = 'active' ORDER BY id")
                .fetch_all(self.pool())
                .await?;

        Ok(services)
    }

    /// Load everything one pricing run needs in four queries. Rule and
    /// coupon rows with undecodable JSON are skipped with a warning rather
    /// than poisoning the whole catalog.
    pub async fn load_catalog(&self, service_id: i64) -> Result<ServiceCatalog, BookingError> {
        let service = self
            .get_service(service_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("service {service_id}")))?;

        let tiers: Vec<TicketTier> = sqlx::query_as(
            r#"
            SELECT * FROM ticket_tiers
            WHERE bookable_service_id = $1
            ORDER BY display_order, id
            "#,
        )
        .bind(service_id)
        .fetch_all(self.pool())
        .await?;

        let add_ons: Vec<AddOn> =
            sqlx::query_as("SELECT * FROM addons WHERE bookable_service_id = $1 ORDER BY id")
                .bind(service_id)
                .fetch_all(self.pool())
                .await?;

        let rule_rows: Vec<PricingRuleRow> = sqlx::query_as(
            r#"
            SELECT * FROM pricing_rules
            WHERE bookable_service_id = $1 AND active
            ORDER BY priority, id
            "#,
        )
        .bind(service_id)
        .fetch_all(self.pool())
        .await?;

        let mut rules = Vec::with_capacity(rule_rows.len());
        for row in rule_rows {
            match decode_rule(&row) {
                Ok(rule) => rules.push(rule),
                Err(err) => {
                    warn!(rule_id = row.id, %err, "Skipping pricing rule with undecodable JSON");
                }
            }
        }

        let coupon_rows: Vec<CouponRow> = sqlx::query_as(
            r#"
            SELECT * FROM coupons
            WHERE bookable_service_id = $1 AND active
            ORDER BY id
            "#,
        )
        .bind(service_id)
        .fetch_all(self.pool())
        .await?;

        let mut coupons = Vec::with_capacity(coupon_rows.len());
        for row in coupon_rows {
            match decode_coupon(&row) {
                Ok(coupon) => coupons.push(coupon),
                Err(err) => {
                    warn!(coupon_id = row.id, %err, "Skipping coupon with undecodable JSON");
                }
            }
        }

        Ok(ServiceCatalog::new(
            service.id,
            service.slot_consumption,
            tiers.iter().map(Into::into).collect(),
            add_ons.iter().map(Into::into).collect(),
            rules,
            coupons,
        ))
    }

    // ---- pricing rules (tenant admin surface) ----

    pub async fn create_pricing_rule(
        &self,
        tenant_id: i64,
        service_id: i64,
        name: &str,
        category: RuleCategory,
        priority: i32,
        is_stackable: bool,
        conditions: Option<&RuleConditions>,
        modification: &PriceModification,
    ) -> Result<PricingRuleRow, BookingError> {
        if let Some(conditions) = conditions {
            conditions.validate()?;
        }
        modification.validate(category)?;

        let conditions_json = match conditions {
            Some(c) => Some(Json(serde_json::to_value(c)?)),
            None => None,
        };

        let row = sqlx::query_as(
            r#"
            INSERT INTO pricing_rules
                (tenant_id, bookable_service_id, name, category, priority,
                 is_stackable, conditions, price_modification)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(service_id)
        .bind(name)
        .bind(category)
        .bind(priority)
        .bind(is_stackable)
        .bind(conditions_json)
        .bind(Json(serde_json::to_value(modification)?))
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    /// Full-replace update: the JSON columns are overwritten wholesale,
    /// never merged field by field.
    pub async fn update_pricing_rule(
        &self,
        rule_id: i64,
        name: &str,
        category: RuleCategory,
        priority: i32,
        is_stackable: bool,
        active: bool,
        conditions: Option<&RuleConditions>,
        modification: &PriceModification,
    ) -> Result<PricingRuleRow, BookingError> {
        if let Some(conditions) = conditions {
            conditions.validate()?;
        }
        modification.validate(category)?;

        let conditions_json = match conditions {
            Some(c) => Some(Json(serde_json::to_value(c)?)),
            None => None,
        };

        let row = sqlx::query_as(
            r#"
            UPDATE pricing_rules
            SET name = $2, category = $3, priority = $4, is_stackable = $5,
                active = $6, conditions = $7, price_modification = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(rule_id)
        .bind(name)
        .bind(category)
        .bind(priority)
        .bind(is_stackable)
        .bind(active)
        .bind(conditions_json)
        .bind(Json(serde_json::to_value(modification)?))
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| BookingError::NotFound(format!("pricing rule {rule_id}")))
    }

    // ---- booking intents ----

    pub async fn create_intent(
        &self,
        tenant_id: i64,
        service_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<BookingIntentRow, BookingError> {
        let intent = sqlx::query_as(
            r#"
            INSERT INTO booking_intents (session_id, tenant_id, bookable_service_id, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(ids::new_session_id())
        .bind(tenant_id)
        .bind(service_id)
        .bind(expires_at)
        .fetch_one(self.pool())
        .await?;

        Ok(intent)
    }

    pub async fn get_intent_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<BookingIntentRow>, BookingError> {
        let intent = sqlx::query_as("SELECT * FROM booking_intents WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(intent)
    }

    /// Slide the expiry window forward on activity.
    pub async fn touch_intent(
        &self,
        intent_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        sqlx::query(
            r#"
            UPDATE booking_intents
            SET expires_at = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(intent_id)
        .bind(expires_at)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn update_intent_quote(
        &self,
        intent_id: i64,
        data: &IntentData,
        subtotal: f64,
        discounts: f64,
        add_ons: f64,
        total: f64,
        expires_at: DateTime<Utc>,
    ) -> Result<BookingIntentRow, BookingError> {
        let intent = sqlx::query_as(
            r#"
            UPDATE booking_intents
            SET intent_data = $2, subtotal_amount = $3, discounts_amount = $4,
                addons_amount = $5, total_amount = $6, expires_at = $7,
                updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(intent_id)
        .bind(Json(data))
        .bind(subtotal)
        .bind(discounts)
        .bind(add_ons)
        .bind(total)
        .bind(expires_at)
        .fetch_optional(self.pool())
        .await?;

        intent.ok_or(BookingError::SessionExpired)
    }

    pub async fn set_intent_customer(
        &self,
        intent_id: i64,
        customer_id: i64,
        data: &IntentData,
        expires_at: DateTime<Utc>,
    ) -> Result<BookingIntentRow, BookingError> {
        let intent = sqlx::query_as(
            r#"
            UPDATE booking_intents
            SET customer_id = $2, intent_data = $3, expires_at = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(intent_id)
        .bind(customer_id)
        .bind(Json(data))
        .bind(expires_at)
        .fetch_optional(self.pool())
        .await?;

        intent.ok_or(BookingError::SessionExpired)
    }

    /// Completion is guarded on `status = 'active'` so it can only happen
    /// once; the returned row count is the arbiter between two racing
    /// finalizations of the same session.
    pub async fn mark_intent_completed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        intent_id: i64,
    ) -> Result<u64, BookingError> {
        let result = sqlx::query(
            r#"
            UPDATE booking_intents
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(intent_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Sweep: flip every active intent past its deadline to expired.
    /// Returns the number of rows swept.
    pub async fn expire_stale_intents(&self, now: DateTime<Utc>) -> Result<u64, BookingError> {
        let result = sqlx::query(
            r#"
            UPDATE booking_intents
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'active' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    // ---- customers ----

    pub async fn find_placeholder_customer(
        &self,
        tenant_id: i64,
    ) -> Result<Option<Customer>, BookingError> {
        let customer = sqlx::query_as(
            r#"
            SELECT * FROM customers
            WHERE tenant_id = $1 AND is_placeholder
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(customer)
    }

    /// Phone is the natural key for returning customers within a tenant.
    /// On conflict the existing row wins and its contact details refresh.
    pub async fn find_or_create_customer_by_phone(
        &self,
        tenant_id: i64,
        name: &str,
        email: Option<&str>,
        phone: &str,
    ) -> Result<Customer, BookingError> {
        let customer = sqlx::query_as(
            r#"
            INSERT INTO customers (tenant_id, name, email, phone)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, phone) WHERE phone IS NOT NULL
            DO UPDATE SET name = EXCLUDED.name, email = COALESCE(EXCLUDED.email, customers.email),
                          updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(email)
        .bind(phone)
        .fetch_one(self.pool())
        .await?;

        Ok(customer)
    }

    // ---- slots ----

    pub async fn get_slot(&self, slot_id: i64) -> Result<Option<AvailabilitySlot>, BookingError> {
        let slot = sqlx::query_as("SELECT * FROM availability_slots WHERE id = $1")
            .bind(slot_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(slot)
    }

    pub async fn list_open_slots(
        &self,
        service_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AvailabilitySlot>, BookingError> {
        let slots = sqlx::query_as(
            r#"
            SELECT * FROM availability_slots
            WHERE bookable_service_id = $1
              AND status = 'open'
              AND start_time >= $2 AND start_time < $3
            ORDER BY start_time
            "#,
        )
        .bind(service_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;

        Ok(slots)
    }

    /// Row-lock the slot for the rest of the transaction. Concurrent
    /// finalizations against the same slot serialize here.
    pub async fn lock_slot(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        slot_id: i64,
    ) -> Result<Option<AvailabilitySlot>, BookingError> {
        let slot = sqlx::query_as("SELECT * FROM availability_slots WHERE id = $1 FOR UPDATE")
            .bind(slot_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(slot)
    }

    pub async fn increment_slot_booked(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        slot_id: i64,
        units: i32,
    ) -> Result<(), BookingError> {
        sqlx::query(
            r#"
            UPDATE availability_slots
            SET booked_count = booked_count + $2
            WHERE id = $1
            "#,
        )
        .bind(slot_id)
        .bind(units)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // ---- coupons ----

    pub async fn increment_coupon_usage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
        code: &str,
    ) -> Result<(), BookingError> {
        sqlx::query(
            r#"
            UPDATE coupons
            SET used_count = used_count + 1, updated_at = NOW()
            WHERE tenant_id = $1 AND code = $2
            "#,
        )
        .bind(tenant_id)
        .bind(code)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // ---- bookings ----

    /// Insert the permanent booking record, retrying with a fresh
    /// reference on the unlikely collision.
    pub async fn insert_booking(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
        service_id: i64,
        customer_id: i64,
        total_amount: f64,
        snapshot: &IntentData,
    ) -> Result<BookingRow, BookingError> {
        for attempt in 0..REFERENCE_RETRIES {
            let reference = ids::new_booking_reference();
            let result: Result<BookingRow, sqlx::Error> = sqlx::query_as(
                r#"
                INSERT INTO bookings
                    (booking_reference, tenant_id, bookable_service_id, customer_id,
                     total_amount, booking_data_snapshot)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(&reference)
            .bind(tenant_id)
            .bind(service_id)
            .bind(customer_id)
            .bind(total_amount)
            .bind(Json(snapshot))
            .fetch_one(&mut **tx)
            .await;

            match result {
                Ok(booking) => return Ok(booking),
                Err(err) if is_unique_violation(&err) && attempt + 1 < REFERENCE_RETRIES => {
                    warn!(%reference, "Booking reference collision, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(BookingError::InvalidState(
            "could not allocate a unique booking reference".to_string(),
        ))
    }

    pub async fn insert_booking_add_ons(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        booking_id: i64,
        add_ons: &[AddOnSnapshot],
    ) -> Result<(), BookingError> {
        for add_on in add_ons {
            sqlx::query(
                r#"
                INSERT INTO booking_addons (booking_id, add_on_id, quantity, price_at_booking)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(booking_id)
            .bind(add_on.add_on_id)
            .bind(add_on.quantity)
            .bind(add_on.price_at_booking)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    pub async fn get_booking_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<BookingRow>, BookingError> {
        let booking = sqlx::query_as("SELECT * FROM bookings WHERE booking_reference = $1")
            .bind(reference)
            .fetch_optional(self.pool())
            .await?;

        Ok(booking)
    }

    pub async fn list_booking_add_ons(
        &self,
        booking_id: i64,
    ) -> Result<Vec<BookingAddOnRow>, BookingError> {
        let rows = sqlx::query_as("SELECT * FROM booking_addons WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    // ---- slot generation support ----

    pub async fn operating_hours(
        &self,
        service_id: i64,
    ) -> Result<Vec<OperatingHour>, BookingError> {
        let hours = sqlx::query_as(
            r#"
            SELECT * FROM operating_hours
            WHERE bookable_service_id = $1
            ORDER BY day_of_week, open_time
            "#,
        )
        .bind(service_id)
        .fetch_all(self.pool())
        .await?;

        Ok(hours)
    }

    pub async fn last_slot_start(
        &self,
        service_id: i64,
    ) -> Result<Option<DateTime<Utc>>, BookingError> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT MAX(start_time) FROM availability_slots
            WHERE bookable_service_id = $1
            HAVING MAX(start_time) IS NOT NULL
            "#,
        )
        .bind(service_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|(t,)| t))
    }

    pub async fn insert_slots(
        &self,
        tenant_id: i64,
        service_id: i64,
        capacity: i32,
        slots: &[(DateTime<Utc>, DateTime<Utc>)],
    ) -> Result<u64, BookingError> {
        // UNNEST keeps this a single round trip per chunk.
        let mut inserted = 0;
        for chunk in slots.chunks(500) {
            let starts: Vec<DateTime<Utc>> = chunk.iter().map(|(s, _)| *s).collect();
            let ends: Vec<DateTime<Utc>> = chunk.iter().map(|(_, e)| *e).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO availability_slots
                    (tenant_id, bookable_service_id, start_time, end_time, capacity)
                SELECT $1, $2, s, e, $3
                FROM UNNEST($4::timestamptz[], $5::timestamptz[]) AS t(s, e)
                "#,
            )
            .bind(tenant_id)
            .bind(service_id)
            .bind(capacity)
            .bind(&starts)
            .bind(&ends)
            .execute(self.pool())
            .await?;

            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    pub async fn close_past_slots(&self, now: DateTime<Utc>) -> Result<u64, BookingError> {
        let result = sqlx::query(
            r#"
            UPDATE availability_slots
            SET status = 'closed'
            WHERE status = 'open' AND start_time < $1
            "#,
        )
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }
}

fn decode_rule(row: &PricingRuleRow) -> Result<ActiveRule, BookingError> {
    let conditions = match row.conditions.as_ref() {
        Some(Json(value)) => Some(serde_json::from_value(value.clone())?),
        None => None,
    };
    let modification = serde_json::from_value(row.price_modification.0.clone())?;

    Ok(ActiveRule {
        id: row.id,
        name: row.name.clone(),
        category: row.category,
        priority: row.priority,
        is_stackable: row.is_stackable,
        conditions,
        modification,
    })
}

fn decode_coupon(row: &CouponRow) -> Result<ActiveCoupon, BookingError> {
    let effect = CouponEffect::decode(row.discount_type, &row.effects)?;
    let conditions = match row.conditions.as_ref() {
        Some(Json(value)) => Some(serde_json::from_value(value.clone())?),
        None => None,
    };

    Ok(ActiveCoupon {
        id: row.id,
        code: row.code.clone(),
        conditions,
        effect,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
