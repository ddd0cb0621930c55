use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::db::models::{BookingIntentRow, BookingRow, IntentStatus, SlotConsumption, SlotStatus};
use crate::db::repository::Repository;
use crate::domain::snapshot::IntentData;
use crate::payment::PaymentGateway;
use crate::pricing::engine::PricingEngine;
use crate::utils::error::BookingError;

/// Tolerance for comparing the recomputed total against the quoted one.
/// Anything past a cent is treated as tampering or drift, never rounding.
pub const PRICE_EPSILON: f64 = 0.01;

/// Turns a quoted intent into a permanent booking: authoritative re-price,
/// integrity check, then one transaction covering the slot lock, payment
/// verification, booking insert, capacity and coupon bookkeeping and
/// intent completion.
pub struct BookingFinalizer {
    repo: Arc<Repository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl BookingFinalizer {
    pub fn new(repo: Arc<Repository>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { repo, gateway }
    }

    /// Open a payment for the quoted total. Refused for unquoted,
    /// anonymous or zero-total intents.
    pub async fn initiate_payment(&self, session_id: &str) -> Result<String, BookingError> {
        let intent = self
            .repo
            .get_intent_by_session(session_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("session {session_id}")))?;

        if intent.is_expired(Utc::now()) {
            return Err(BookingError::SessionExpired);
        }
        let has_visitor = intent.customer_id.is_some()
            || intent
                .intent_data
                .as_ref()
                .is_some_and(|d| d.0.visitor_info.is_some());
        if !has_visitor {
            return Err(BookingError::InvalidState(
                "visitor info is required before payment".to_string(),
            ));
        }
        match intent.total_amount {
            Some(total) if total > 0.0 => {}
            Some(_) => {
                return Err(BookingError::InvalidState(
                    "cannot initiate payment for a zero total".to_string(),
                ));
            }
            None => {
                return Err(BookingError::InvalidState(
                    "a quote is required before payment".to_string(),
                ));
            }
        }

        self.gateway.initiate_payment(&intent).await
    }

    pub async fn finalize(
        &self,
        session_id: &str,
        payment_token: &str,
    ) -> Result<BookingRow, BookingError> {
        let intent = self
            .repo
            .get_intent_by_session(session_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("session {session_id}")))?;

        if intent.status != IntentStatus::Active {
            return Err(BookingError::InvalidState(format!(
                "intent is {:?}, only active intents can finalize",
                intent.status
            )));
        }
        if intent.expires_at <= Utc::now() {
            return Err(BookingError::SessionExpired);
        }

        let data: IntentData = intent
            .intent_data
            .as_ref()
            .map(|d| d.0.clone())
            .ok_or_else(|| {
                BookingError::InvalidState("intent has no quoted selection".to_string())
            })?;

        let recorded_total = intent.total_amount.ok_or_else(|| {
            BookingError::InvalidState("intent has no quoted total".to_string())
        })?;

        let catalog = self.repo.load_catalog(intent.bookable_service_id).await?;
        let units = requested_units(&data, catalog.slot_consumption);
        if units <= 0 {
            return Err(BookingError::InvalidState(
                "intent has no tickets to book".to_string(),
            ));
        }

        // Re-price from the stored snapshot, never from client input. Rules
        // or tier prices may have moved since quote time.
        let breakdown = PricingEngine::new(&catalog).calculate(data.date, &data.selection())?;
        let expected = breakdown.final_total;

        if !price_matches(expected, recorded_total) {
            error!(
                session_id,
                expected, recorded = recorded_total,
                "Price integrity violation at finalization"
            );
            return Err(BookingError::PriceIntegrityViolation {
                expected,
                recorded: recorded_total,
            });
        }

        let customer_id = self.resolve_customer(&intent, &data).await?;

        let mut tx = self.repo.pool().begin().await?;

        // The lock is held across payment verification on purpose: the slot
        // must still be ours when the money settles.
        let slot = self
            .repo
            .lock_slot(&mut tx, data.slot_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("slot {}", data.slot_id)))?;

        if slot.status != SlotStatus::Open || slot.remaining() < units {
            return Err(BookingError::CapacityExceeded);
        }

        if !self.gateway.verify_payment(payment_token).await? {
            return Err(BookingError::PaymentFailure(
                "payment could not be verified".to_string(),
            ));
        }

        // The booking carries the authoritative re-priced total, not the
        // quoted one; within the epsilon they can differ by a fraction of a
        // cent and the audit record wants the recomputed figure.
        let booking = self
            .repo
            .insert_booking(
                &mut tx,
                intent.tenant_id,
                intent.bookable_service_id,
                customer_id,
                expected,
                &data,
            )
            .await?;

        self.repo
            .insert_booking_add_ons(&mut tx, booking.id, &data.add_ons)
            .await?;

        self.repo
            .increment_slot_booked(&mut tx, slot.id, units)
            .await?;

        let coupon_applied = data.coupon_code.as_deref().is_some_and(|code| {
            data.applied_discounts
                .iter()
                .any(|d| d.name == format!("Coupon: {code}"))
        });
        if coupon_applied {
            if let Some(code) = data.coupon_code.as_deref() {
                self.repo
                    .increment_coupon_usage(&mut tx, intent.tenant_id, code)
                    .await?;
            }
        }

        // The status read at the top can go stale under a concurrent
        // finalize of the same session; the guarded update decides who won,
        // and the loser's whole transaction rolls back.
        if self.repo.mark_intent_completed(&mut tx, intent.id).await? != 1 {
            return Err(BookingError::InvalidState(
                "intent was finalized concurrently".to_string(),
            ));
        }

        tx.commit().await?;

        info!(
            session_id,
            booking_reference = %booking.booking_reference,
            total = booking.total_amount,
            "Booking finalized"
        );

        Ok(booking)
    }

    /// Customer already linked by the visitor-info step, or resolved late
    /// from the stored snapshot: guests share the tenant placeholder row,
    /// identified visitors match by phone.
    async fn resolve_customer(
        &self,
        intent: &BookingIntentRow,
        data: &IntentData,
    ) -> Result<i64, BookingError> {
        if let Some(customer_id) = intent.customer_id {
            return Ok(customer_id);
        }

        let visitor = data.visitor_info.as_ref().ok_or_else(|| {
            BookingError::InvalidState("visitor info is required before finalization".to_string())
        })?;

        let customer = if visitor.is_guest {
            self.repo
                .find_placeholder_customer(intent.tenant_id)
                .await?
                .ok_or_else(|| {
                    BookingError::InvalidState(
                        "tenant has no placeholder customer for guest checkout".to_string(),
                    )
                })?
        } else {
            self.repo
                .find_or_create_customer_by_phone(
                    intent.tenant_id,
                    &visitor.name,
                    visitor.email.as_deref(),
                    &visitor.phone,
                )
                .await?
        };

        Ok(customer.id)
    }
}

/// Recomputed and recorded totals agree when they differ by less than a
/// cent.
pub fn price_matches(expected: f64, recorded: f64) -> bool {
    (expected - recorded).abs() < PRICE_EPSILON
}

/// Capacity units this intent consumes from its slot.
pub fn requested_units(data: &IntentData, consumption: SlotConsumption) -> i32 {
    match consumption {
        SlotConsumption::PerTicket => data.total_ticket_quantity() as i32,
        SlotConsumption::PerBooking => i32::from(data.total_ticket_quantity() > 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::breakdown::LineItem;

    fn data_with_quantities(quantities: &[i64]) -> IntentData {
        IntentData {
            date: "2026-09-05".parse().unwrap(),
            slot_id: 1,
            tickets: quantities
                .iter()
                .enumerate()
                .map(|(i, q)| LineItem {
                    ticket_tier_id: i as i64 + 1,
                    name: format!("Tier {}", i + 1),
                    quantity: *q,
                    unit_price: 10.0,
                    subtotal: 10.0 * *q as f64,
                })
                .collect(),
            add_ons: vec![],
            coupon_code: None,
            applied_discounts: vec![],
            visitor_info: None,
        }
    }

    #[test]
    fn price_comparison_tolerates_sub_cent_noise() {
        assert!(price_matches(40.50, 40.50));
        assert!(price_matches(40.504999, 40.50));
        assert!(!price_matches(40.52, 40.50));
        assert!(!price_matches(40.0, 45.0));
    }

    #[test]
    fn per_ticket_consumption_counts_every_ticket() {
        let data = data_with_quantities(&[2, 3]);
        assert_eq!(requested_units(&data, SlotConsumption::PerTicket), 5);
    }

    #[test]
    fn per_booking_consumption_is_a_single_unit() {
        let data = data_with_quantities(&[2, 3]);
        assert_eq!(requested_units(&data, SlotConsumption::PerBooking), 1);

        let empty = data_with_quantities(&[]);
        assert_eq!(requested_units(&empty, SlotConsumption::PerBooking), 0);
    }
}
