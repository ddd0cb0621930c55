use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::models::{BookableService, BookingIntentRow};
use crate::db::repository::Repository;
use crate::domain::breakdown::PriceBreakdown;
use crate::domain::selection::Selection;
use crate::domain::snapshot::{AddOnSnapshot, IntentData, VisitorInfo};
use crate::pricing::engine::{CatalogAddOn, PricedTier, PricingEngine, ServiceCatalog};
use crate::utils::error::BookingError;

/// A session together with the catalog context the booking form needs to
/// re-render: the service, its tiers priced for the quoted date and its
/// add-ons.
pub struct SessionView {
    pub intent: BookingIntentRow,
    pub service: BookableService,
    pub tiers: Vec<PricedTier>,
    pub add_ons: Vec<CatalogAddOn>,
}

/// Session lifecycle around booking intents: anonymous start, sliding
/// expiry, quote persistence, visitor identification and the sweep.
pub struct BookingIntentStore {
    repo: Arc<Repository>,
    browse_ttl: Duration,
    checkout_ttl: Duration,
}

impl BookingIntentStore {
    pub fn new(repo: Arc<Repository>, browse_ttl_minutes: i64, checkout_ttl_minutes: i64) -> Self {
        Self {
            repo,
            browse_ttl: Duration::minutes(browse_ttl_minutes),
            checkout_ttl: Duration::minutes(checkout_ttl_minutes),
        }
    }

    /// Resume an active session, or open a fresh one against the service.
    /// A resumable session gets its browse window pushed forward.
    pub async fn start_or_resume(
        &self,
        service_uuid: Uuid,
        session_id: Option<&str>,
    ) -> Result<BookingIntentRow, BookingError> {
        let service = self.require_service(service_uuid).await?;
        let now = Utc::now();

        if let Some(session_id) = session_id {
            if let Some(intent) = self.repo.get_intent_by_session(session_id).await? {
                if !intent.is_expired(now) && intent.bookable_service_id == service.id {
                    self.repo.touch_intent(intent.id, now + self.browse_ttl).await?;
                    debug!(session_id, "Resumed booking session");
                    return self
                        .repo
                        .get_intent_by_session(session_id)
                        .await?
                        .ok_or(BookingError::SessionExpired);
                }
            }
        }

        let intent = self
            .repo
            .create_intent(service.tenant_id, service.id, now + self.browse_ttl)
            .await?;
        info!(session_id = %intent.session_id, service_id = service.id, "Booking session started");
        Ok(intent)
    }

    /// Price the current selection and persist the resulting snapshot and
    /// amounts on the intent, resuming the session or opening a fresh one.
    /// Quoting marks an active checkout, so the tighter TTL applies from
    /// here on.
    pub async fn calculate_and_persist(
        &self,
        service_uuid: Uuid,
        session_id: Option<&str>,
        date: NaiveDate,
        slot_id: i64,
        selection: &Selection,
    ) -> Result<(BookingIntentRow, PriceBreakdown), BookingError> {
        let intent = self.start_or_resume(service_uuid, session_id).await?;

        let slot = self
            .repo
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("slot {slot_id}")))?;
        if slot.bookable_service_id != intent.bookable_service_id {
            return Err(BookingError::Validation(
                "slot does not belong to this service".to_string(),
            ));
        }

        let catalog = self.repo.load_catalog(intent.bookable_service_id).await?;
        let breakdown = PricingEngine::new(&catalog).calculate(date, selection)?;

        let mut data = build_intent_data(&catalog, &breakdown, date, slot_id, selection);
        // visitor info survives re-quotes
        if let Some(existing) = intent.intent_data.as_ref() {
            data.visitor_info = existing.0.visitor_info.clone();
        }

        let intent = self
            .repo
            .update_intent_quote(
                intent.id,
                &data,
                breakdown.adjusted_subtotal,
                breakdown.discounts_total(),
                breakdown.add_ons_total,
                breakdown.final_total,
                Utc::now() + self.checkout_ttl,
            )
            .await?;

        debug!(
            session_id = %intent.session_id,
            total = breakdown.final_total,
            "Quote persisted on intent"
        );
        Ok((intent, breakdown))
    }

    /// Attach the visitor to the intent. Guests share the tenant's
    /// placeholder customer row; identified visitors are matched by phone.
    pub async fn store_visitor_info(
        &self,
        session_id: &str,
        visitor: VisitorInfo,
    ) -> Result<BookingIntentRow, BookingError> {
        let intent = self.require_active(session_id).await?;

        let mut data = intent
            .intent_data
            .as_ref()
            .map(|d| d.0.clone())
            .ok_or_else(|| {
                BookingError::InvalidState("a quote is required before visitor info".to_string())
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
            if visitor.name.trim().is_empty() || visitor.phone.trim().is_empty() {
                return Err(BookingError::Validation(
                    "visitor name and phone are required".to_string(),
                ));
            }
            self.repo
                .find_or_create_customer_by_phone(
                    intent.tenant_id,
                    &visitor.name,
                    visitor.email.as_deref(),
                    &visitor.phone,
                )
                .await?
        };

        data.visitor_info = Some(visitor);

        self.repo
            .set_intent_customer(intent.id, customer.id, &data, Utc::now() + self.checkout_ttl)
            .await
    }

    /// The session as the client sees it, expiry enforced, hydrated with
    /// the service, its priced tiers and add-ons. The stored snapshot alone
    /// cannot repopulate the booking form after an edit, so tiers are
    /// priced for the quoted date (or today before a quote exists).
    pub async fn show(&self, session_id: &str) -> Result<SessionView, BookingError> {
        let intent = self.require_active(session_id).await?;

        let service = self
            .repo
            .get_service(intent.bookable_service_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("service {}", intent.bookable_service_id))
            })?;
        let catalog = self.repo.load_catalog(service.id).await?;

        let date = intent
            .intent_data
            .as_ref()
            .map(|d| d.0.date)
            .unwrap_or_else(|| Utc::now().date_naive());
        let tiers = PricingEngine::new(&catalog).priced_tiers_for_date(date);

        Ok(SessionView {
            intent,
            service,
            tiers,
            add_ons: catalog.add_ons,
        })
    }

    pub async fn expire_stale(&self) -> Result<u64, BookingError> {
        let swept = self.repo.expire_stale_intents(Utc::now()).await?;
        if swept > 0 {
            info!(swept, "Expired stale booking intents");
        }
        Ok(swept)
    }

    async fn require_service(&self, uuid: Uuid) -> Result<BookableService, BookingError> {
        self.repo
            .get_service_by_uuid(uuid)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("service {uuid}")))
    }

    async fn require_active(&self, session_id: &str) -> Result<BookingIntentRow, BookingError> {
        let intent = self
            .repo
            .get_intent_by_session(session_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("session {session_id}")))?;

        if intent.is_expired(Utc::now()) {
            return Err(BookingError::SessionExpired);
        }
        Ok(intent)
    }
}

/// Assemble the persisted snapshot from a finished pricing run. Line items
/// come from the breakdown, not the raw request, so the snapshot records
/// the prices actually charged.
pub fn build_intent_data(
    catalog: &ServiceCatalog,
    breakdown: &PriceBreakdown,
    date: NaiveDate,
    slot_id: i64,
    selection: &Selection,
) -> IntentData {
    let add_ons = selection
        .add_ons
        .iter()
        .filter(|chosen| chosen.quantity > 0)
        .filter_map(|chosen| {
            catalog.add_on(chosen.add_on_id).map(|add_on| AddOnSnapshot {
                add_on_id: add_on.id,
                name: add_on.name.clone(),
                quantity: chosen.quantity,
                price_at_booking: if add_on.is_included_in_ticket {
                    0.0
                } else {
                    add_on.price.unwrap_or(0.0)
                },
            })
        })
        .collect();

    IntentData {
        date,
        slot_id,
        tickets: breakdown.line_items.clone(),
        add_ons,
        coupon_code: selection.coupon_code.clone(),
        applied_discounts: breakdown.applied_discounts.clone(),
        visitor_info: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SlotConsumption;
    use crate::domain::selection::{AddOnSelection, TicketSelection};
    use crate::pricing::engine::{CatalogAddOn, CatalogTier};

    fn catalog() -> ServiceCatalog {
        ServiceCatalog::new(
            1,
            SlotConsumption::PerTicket,
            vec![CatalogTier {
                id: 1,
                name: "Adult".to_string(),
                base_price: 20.0,
                min_quantity: 1,
                max_quantity: None,
                display_order: 0,
            }],
            vec![
                CatalogAddOn {
                    id: 9,
                    name: "Locker".to_string(),
                    price: Some(4.0),
                    is_included_in_ticket: false,
                },
                CatalogAddOn {
                    id: 10,
                    name: "Wristband".to_string(),
                    price: Some(2.0),
                    is_included_in_ticket: true,
                },
            ],
            vec![],
            vec![],
        )
    }

    #[test]
    fn snapshot_copies_priced_lines_and_zeroes_included_add_ons() {
        let catalog = catalog();
        let selection = Selection {
            tickets: vec![TicketSelection {
                tier_id: 1,
                quantity: 2,
            }],
            add_ons: vec![
                AddOnSelection {
                    add_on_id: 9,
                    quantity: 1,
                },
                AddOnSelection {
                    add_on_id: 10,
                    quantity: 2,
                },
            ],
            coupon_code: None,
        };
        let date = "2026-09-05".parse().unwrap();
        let breakdown = PricingEngine::new(&catalog).calculate(date, &selection).unwrap();

        let data = build_intent_data(&catalog, &breakdown, date, 42, &selection);

        assert_eq!(data.slot_id, 42);
        assert_eq!(data.tickets, breakdown.line_items);
        assert_eq!(data.add_ons.len(), 2);
        assert_eq!(data.add_ons[0].price_at_booking, 4.0);
        assert_eq!(data.add_ons[1].price_at_booking, 0.0);
        assert_eq!(data.total_ticket_quantity(), 2);
    }

    #[test]
    fn snapshot_skips_zero_quantity_add_ons() {
        let catalog = catalog();
        let selection = Selection {
            tickets: vec![TicketSelection {
                tier_id: 1,
                quantity: 1,
            }],
            add_ons: vec![AddOnSelection {
                add_on_id: 9,
                quantity: 0,
            }],
            coupon_code: None,
        };
        let date = "2026-09-05".parse().unwrap();
        let breakdown = PricingEngine::new(&catalog).calculate(date, &selection).unwrap();

        let data = build_intent_data(&catalog, &breakdown, date, 1, &selection);
        assert!(data.add_ons.is_empty());
    }
}
