use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::db::models::{AddOn, SlotConsumption, TicketTier};
use crate::domain::breakdown::{AppliedDiscount, LineItem, PriceBreakdown, round2};
use crate::domain::rules::{ActiveCoupon, ActiveRule, RuleCategory};
use crate::domain::selection::Selection;
use crate::pricing::conditions::{
    TierQuantity, coupon_conditions_met, is_satisfied, matches_for_date_preview,
};
use crate::pricing::modifications::{
    coupon_discount_amount, discount_amount, unit_price_override,
};
use crate::utils::error::BookingError;

/// Tier fields the engine needs, detached from the persistence row so
/// pricing stays pure and cheap to construct in tests.
#[derive(Debug, Clone)]
pub struct CatalogTier {
    pub id: i64,
    pub name: String,
    pub base_price: f64,
    pub min_quantity: i64,
    pub max_quantity: Option<i64>,
    pub display_order: i32,
}

impl From<&TicketTier> for CatalogTier {
    fn from(row: &TicketTier) -> Self {
        CatalogTier {
            id: row.id,
            name: row.name.clone(),
            base_price: row.base_price,
            min_quantity: row.min_quantity,
            max_quantity: row.max_quantity,
            display_order: row.display_order,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogAddOn {
    pub id: i64,
    pub name: String,
    pub price: Option<f64>,
    pub is_included_in_ticket: bool,
}

impl From<&AddOn> for CatalogAddOn {
    fn from(row: &AddOn) -> Self {
        CatalogAddOn {
            id: row.id,
            name: row.name.clone(),
            price: row.price,
            is_included_in_ticket: row.is_included_in_ticket,
        }
    }
}

/// Everything one pricing run needs, loaded in a single repository call.
/// Rules arrive active-only and are kept in `(priority, id)` ascending
/// order so repeated re-pricing is deterministic.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    pub service_id: i64,
    pub slot_consumption: SlotConsumption,
    pub tiers: Vec<CatalogTier>,
    pub add_ons: Vec<CatalogAddOn>,
    pub rules: Vec<ActiveRule>,
    pub coupons: Vec<ActiveCoupon>,
}

impl ServiceCatalog {
    pub fn new(
        service_id: i64,
        slot_consumption: SlotConsumption,
        tiers: Vec<CatalogTier>,
        add_ons: Vec<CatalogAddOn>,
        mut rules: Vec<ActiveRule>,
        coupons: Vec<ActiveCoupon>,
    ) -> Self {
        rules.sort_by_key(|r| (r.priority, r.id));
        ServiceCatalog {
            service_id,
            slot_consumption,
            tiers,
            add_ons,
            rules,
            coupons,
        }
    }

    pub fn tier(&self, id: i64) -> Option<&CatalogTier> {
        self.tiers.iter().find(|t| t.id == id)
    }

    pub fn add_on(&self, id: i64) -> Option<&CatalogAddOn> {
        self.add_ons.iter().find(|a| a.id == id)
    }

    pub fn coupon(&self, code: &str) -> Option<&ActiveCoupon> {
        self.coupons.iter().find(|c| c.code == code)
    }

    fn rules_in(&self, category: RuleCategory) -> impl Iterator<Item = &ActiveRule> {
        self.rules.iter().filter(move |r| r.category == category)
    }
}

/// Priced tier preview for a date, before the customer picks quantities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedTier {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub base_price: f64,
    pub min_quantity: i64,
    pub max_quantity: Option<i64>,
}

pub struct PricingEngine<'a> {
    catalog: &'a ServiceCatalog,
}

impl<'a> PricingEngine<'a> {
    pub fn new(catalog: &'a ServiceCatalog) -> Self {
        PricingEngine { catalog }
    }

    /// Compute the full price breakdown for a date and selection. Pure over
    /// the catalog: identical inputs always produce identical output, which
    /// finalization relies on when it re-prices a stored intent.
    pub fn calculate(
        &self,
        date: NaiveDate,
        selection: &Selection,
    ) -> Result<PriceBreakdown, BookingError> {
        self.validate_selection(selection)?;

        let mut breakdown = PriceBreakdown::default();

        self.process_line_items(&mut breakdown, date, selection);

        if breakdown.adjusted_subtotal > 0.0 {
            self.apply_automatic_discounts(&mut breakdown, date);

            if let Some(code) = selection.coupon_code.as_deref() {
                self.apply_coupon_discount(&mut breakdown, code, date);
            }
        }

        self.process_add_on_costs(&mut breakdown, selection);

        breakdown.calculate_final_total();

        debug!(
            service_id = self.catalog.service_id,
            %date,
            adjusted_subtotal = breakdown.adjusted_subtotal,
            discounts = breakdown.discounts_total(),
            final_total = breakdown.final_total,
            "Price breakdown computed"
        );

        Ok(breakdown)
    }

    /// Adjusted prices for every tier on a date, for the booking form
    /// before quantities exist. Runs only the phase-1 adjustment pass.
    pub fn priced_tiers_for_date(&self, date: NaiveDate) -> Vec<PricedTier> {
        let adjustment = self
            .catalog
            .rules_in(RuleCategory::BasePriceAdjustment)
            .find(|rule| matches_for_date_preview(rule.conditions.as_ref(), date));

        let mut tiers: Vec<&CatalogTier> = self.catalog.tiers.iter().collect();
        tiers.sort_by_key(|t| (t.display_order, t.id));

        tiers
            .into_iter()
            .map(|tier| {
                let price = adjustment
                    .and_then(|rule| unit_price_override(&rule.modification, tier.id))
                    .unwrap_or(tier.base_price);
                PricedTier {
                    id: tier.id,
                    name: tier.name.clone(),
                    price: round2(price),
                    base_price: tier.base_price,
                    min_quantity: tier.min_quantity,
                    max_quantity: tier.max_quantity,
                }
            })
            .collect()
    }

    fn validate_selection(&self, selection: &Selection) -> Result<(), BookingError> {
        for ticket in &selection.tickets {
            if ticket.quantity < 0 {
                return Err(BookingError::Validation(format!(
                    "negative quantity for ticket tier {}",
                    ticket.tier_id
                )));
            }
            if self.catalog.tier(ticket.tier_id).is_none() {
                return Err(BookingError::Validation(format!(
                    "unknown ticket tier {}",
                    ticket.tier_id
                )));
            }
        }
        for add_on in &selection.add_ons {
            if add_on.quantity < 0 {
                return Err(BookingError::Validation(format!(
                    "negative quantity for add-on {}",
                    add_on.add_on_id
                )));
            }
            if self.catalog.add_on(add_on.add_on_id).is_none() {
                return Err(BookingError::Validation(format!(
                    "unknown add-on {}",
                    add_on.add_on_id
                )));
            }
        }
        Ok(())
    }

    /// Phase 1: line items and subtotals. The first matching adjustment
    /// rule wins; later adjustment rules are ignored even if satisfied.
    fn process_line_items(
        &self,
        breakdown: &mut PriceBreakdown,
        date: NaiveDate,
        selection: &Selection,
    ) {
        let selected: Vec<TierQuantity> = selection
            .tickets
            .iter()
            .map(|t| TierQuantity {
                ticket_tier_id: t.tier_id,
                quantity: t.quantity,
            })
            .collect();

        let adjustment = self
            .catalog
            .rules_in(RuleCategory::BasePriceAdjustment)
            .find(|rule| is_satisfied(rule.conditions.as_ref(), date, &selected));

        for ticket in &selection.tickets {
            if ticket.quantity <= 0 {
                continue;
            }
            // validated above
            let Some(tier) = self.catalog.tier(ticket.tier_id) else {
                continue;
            };

            let base_price = tier.base_price;
            let unit_price = adjustment
                .and_then(|rule| unit_price_override(&rule.modification, tier.id))
                .unwrap_or(base_price);

            let quantity = ticket.quantity;
            breakdown.line_items.push(LineItem {
                ticket_tier_id: tier.id,
                name: tier.name.clone(),
                quantity,
                unit_price,
                subtotal: unit_price * quantity as f64,
            });
            breakdown.base_subtotal += base_price * quantity as f64;
            breakdown.adjusted_subtotal += unit_price * quantity as f64;
        }
    }

    /// Phase 2: automatic discounts in priority order. A non-stackable rule
    /// that produces a positive amount replaces everything accumulated so
    /// far and locks further non-stackable rules out.
    fn apply_automatic_discounts(&self, breakdown: &mut PriceBreakdown, date: NaiveDate) {
        let line_quantities: Vec<TierQuantity> = breakdown
            .line_items
            .iter()
            .map(|item| TierQuantity {
                ticket_tier_id: item.ticket_tier_id,
                quantity: item.quantity,
            })
            .collect();

        let mut non_stackable_applied = false;

        for rule in self.catalog.rules_in(RuleCategory::Discount) {
            if non_stackable_applied && !rule.is_stackable {
                continue;
            }

            if !is_satisfied(rule.conditions.as_ref(), date, &line_quantities) {
                continue;
            }

            let amount = discount_amount(
                &rule.modification,
                breakdown.adjusted_subtotal,
                &breakdown.line_items,
            );

            if amount > 0.0 {
                if !rule.is_stackable {
                    breakdown.applied_discounts.clear();
                    non_stackable_applied = true;
                }
                breakdown.applied_discounts.push(AppliedDiscount {
                    name: rule.name.clone(),
                    amount: round2(amount),
                });
            }
        }
    }

    /// Phase 3: explicit coupon. Unknown or inactive codes are a silent
    /// no-op, deliberately not an error.
    fn apply_coupon_discount(&self, breakdown: &mut PriceBreakdown, code: &str, date: NaiveDate) {
        let Some(coupon) = self.catalog.coupon(code) else {
            debug!(code, "Coupon code did not resolve, skipping");
            return;
        };

        if !coupon_conditions_met(coupon.conditions.as_ref(), date, breakdown.adjusted_subtotal) {
            return;
        }

        let amount = coupon_discount_amount(
            &coupon.effect,
            breakdown.adjusted_subtotal,
            &breakdown.line_items,
        );

        if amount > 0.0 {
            breakdown.applied_discounts.push(AppliedDiscount {
                name: format!("Coupon: {}", coupon.code),
                amount: round2(amount),
            });
        }
    }

    /// Phase 4: add-on costs. Included add-ons contribute nothing.
    fn process_add_on_costs(&self, breakdown: &mut PriceBreakdown, selection: &Selection) {
        let mut total = 0.0;
        for chosen in &selection.add_ons {
            if chosen.quantity <= 0 {
                continue;
            }
            let Some(add_on) = self.catalog.add_on(chosen.add_on_id) else {
                continue;
            };
            if !add_on.is_included_in_ticket {
                total += add_on.price.unwrap_or(0.0) * chosen.quantity as f64;
            }
        }
        breakdown.add_ons_total = total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::{
        ActiveCoupon, CalculationMode, CouponConditions, CouponEffect, PriceModification,
        RuleConditions, TierPriceOverride,
    };
    use crate::domain::selection::{AddOnSelection, TicketSelection};

    const ADULT: i64 = 1;
    const CHILD: i64 = 2;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn tier(id: i64, name: &str, base_price: f64) -> CatalogTier {
        CatalogTier {
            id,
            name: name.to_string(),
            base_price,
            min_quantity: 1,
            max_quantity: Some(10),
            display_order: id as i32,
        }
    }

    fn weekend_fixed_price(id: i64, priority: i32, tier_id: i64, value: f64) -> ActiveRule {
        ActiveRule {
            id,
            name: format!("Weekend price {value}"),
            category: RuleCategory::BasePriceAdjustment,
            priority,
            is_stackable: false,
            conditions: Some(RuleConditions::Date {
                from_date: None,
                to_date: None,
                days_of_week: Some(vec![0, 6]),
                specific_dates: None,
            }),
            modification: PriceModification::SetFixedPrice {
                tiers: vec![TierPriceOverride {
                    ticket_tier_id: tier_id,
                    value,
                }],
            },
        }
    }

    fn percent_discount(id: i64, priority: i32, amount: f64, stackable: bool) -> ActiveRule {
        ActiveRule {
            id,
            name: format!("{amount}% off"),
            category: RuleCategory::Discount,
            priority,
            is_stackable: stackable,
            conditions: None,
            modification: PriceModification::TotalAmountDiscount {
                calculation_mode: CalculationMode::Percentage,
                amount,
            },
        }
    }

    fn fixed_discount(id: i64, priority: i32, amount: f64, stackable: bool) -> ActiveRule {
        ActiveRule {
            id,
            name: format!("${amount} off"),
            category: RuleCategory::Discount,
            priority,
            is_stackable: stackable,
            conditions: None,
            modification: PriceModification::TotalAmountDiscount {
                calculation_mode: CalculationMode::Fixed,
                amount,
            },
        }
    }

    fn catalog(rules: Vec<ActiveRule>, coupons: Vec<ActiveCoupon>) -> ServiceCatalog {
        ServiceCatalog::new(
            1,
            SlotConsumption::PerTicket,
            vec![tier(ADULT, "Adult", 20.0), tier(CHILD, "Child", 10.0)],
            vec![
                CatalogAddOn {
                    id: 100,
                    name: "Locker".to_string(),
                    price: Some(4.0),
                    is_included_in_ticket: false,
                },
                CatalogAddOn {
                    id: 101,
                    name: "Wristband".to_string(),
                    price: None,
                    is_included_in_ticket: true,
                },
            ],
            rules,
            coupons,
        )
    }

    fn tickets(pairs: &[(i64, i64)]) -> Selection {
        Selection {
            tickets: pairs
                .iter()
                .map(|(tier_id, quantity)| TicketSelection {
                    tier_id: *tier_id,
                    quantity: *quantity,
                })
                .collect(),
            add_ons: vec![],
            coupon_code: None,
        }
    }

    #[test]
    fn plain_selection_prices_at_base() {
        let catalog = catalog(vec![], vec![]);
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine
            .calculate(date("2026-09-07"), &tickets(&[(ADULT, 2), (CHILD, 1)]))
            .unwrap();

        assert_eq!(breakdown.base_subtotal, 50.0);
        assert_eq!(breakdown.adjusted_subtotal, 50.0);
        assert_eq!(breakdown.final_total, 50.0);
        assert_eq!(breakdown.line_items.len(), 2);
    }

    #[test]
    fn zero_quantity_lines_are_skipped() {
        let catalog = catalog(vec![], vec![]);
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine
            .calculate(date("2026-09-07"), &tickets(&[(ADULT, 2), (CHILD, 0)]))
            .unwrap();
        assert_eq!(breakdown.line_items.len(), 1);
        assert_eq!(breakdown.final_total, 40.0);
    }

    #[test]
    fn unknown_tier_is_a_validation_error() {
        let catalog = catalog(vec![], vec![]);
        let engine = PricingEngine::new(&catalog);
        let err = engine
            .calculate(date("2026-09-07"), &tickets(&[(99, 1)]))
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn negative_quantity_is_a_validation_error() {
        let catalog = catalog(vec![], vec![]);
        let engine = PricingEngine::new(&catalog);
        let err = engine
            .calculate(date("2026-09-07"), &tickets(&[(ADULT, -1)]))
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn first_matching_adjustment_rule_wins() {
        let catalog = catalog(
            vec![
                weekend_fixed_price(10, 0, ADULT, 15.0),
                weekend_fixed_price(11, 1, ADULT, 5.0),
            ],
            vec![],
        );
        let engine = PricingEngine::new(&catalog);
        // Saturday
        let breakdown = engine
            .calculate(date("2026-09-05"), &tickets(&[(ADULT, 2)]))
            .unwrap();
        assert_eq!(breakdown.line_items[0].unit_price, 15.0);
        assert_eq!(breakdown.adjusted_subtotal, 30.0);
        assert_eq!(breakdown.base_subtotal, 40.0);
    }

    #[test]
    fn adjustment_priority_ties_break_on_rule_id() {
        let catalog = catalog(
            vec![
                weekend_fixed_price(22, 0, ADULT, 5.0),
                weekend_fixed_price(21, 0, ADULT, 15.0),
            ],
            vec![],
        );
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine
            .calculate(date("2026-09-05"), &tickets(&[(ADULT, 1)]))
            .unwrap();
        assert_eq!(breakdown.line_items[0].unit_price, 15.0);
    }

    #[test]
    fn unlisted_tiers_keep_base_price_under_adjustment() {
        let catalog = catalog(vec![weekend_fixed_price(10, 0, ADULT, 15.0)], vec![]);
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine
            .calculate(date("2026-09-05"), &tickets(&[(ADULT, 1), (CHILD, 1)]))
            .unwrap();
        let child = breakdown
            .line_items
            .iter()
            .find(|i| i.ticket_tier_id == CHILD)
            .unwrap();
        assert_eq!(child.unit_price, 10.0);
    }

    #[test]
    fn non_stackable_discount_replaces_stackable_ones() {
        let catalog = catalog(
            vec![
                fixed_discount(30, 1, 5.0, true),
                fixed_discount(31, 2, 10.0, false),
            ],
            vec![],
        );
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine
            .calculate(date("2026-09-07"), &tickets(&[(ADULT, 5)]))
            .unwrap();

        assert_eq!(breakdown.applied_discounts.len(), 1);
        assert_eq!(breakdown.applied_discounts[0].amount, 10.0);
        assert_eq!(breakdown.final_total, 90.0);
    }

    #[test]
    fn stackable_discount_after_non_stackable_still_applies() {
        let catalog = catalog(
            vec![
                fixed_discount(30, 1, 10.0, false),
                fixed_discount(31, 2, 5.0, true),
            ],
            vec![],
        );
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine
            .calculate(date("2026-09-07"), &tickets(&[(ADULT, 5)]))
            .unwrap();

        let amounts: Vec<f64> = breakdown.applied_discounts.iter().map(|d| d.amount).collect();
        assert_eq!(amounts, vec![10.0, 5.0]);
    }

    #[test]
    fn second_non_stackable_discount_is_locked_out() {
        let catalog = catalog(
            vec![
                fixed_discount(30, 1, 10.0, false),
                fixed_discount(31, 2, 50.0, false),
            ],
            vec![],
        );
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine
            .calculate(date("2026-09-07"), &tickets(&[(ADULT, 5)]))
            .unwrap();
        assert_eq!(breakdown.applied_discounts.len(), 1);
        assert_eq!(breakdown.applied_discounts[0].amount, 10.0);
    }

    #[test]
    fn discounts_never_push_the_total_negative() {
        let catalog = catalog(vec![fixed_discount(30, 1, 500.0, false)], vec![]);
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine
            .calculate(date("2026-09-07"), &tickets(&[(ADULT, 1)]))
            .unwrap();
        assert_eq!(breakdown.final_total, 0.0);
    }

    #[test]
    fn discounts_skip_an_empty_cart() {
        let catalog = catalog(vec![fixed_discount(30, 1, 5.0, true)], vec![]);
        let engine = PricingEngine::new(&catalog);
        let breakdown = engine.calculate(date("2026-09-07"), &tickets(&[])).unwrap();
        assert!(breakdown.applied_discounts.is_empty());
        assert_eq!(breakdown.final_total, 0.0);
    }

    #[test]
    fn included_add_ons_cost_nothing() {
        let catalog = catalog(vec![], vec![]);
        let engine = PricingEngine::new(&catalog);
        let mut selection = tickets(&[(ADULT, 1)]);
        selection.add_ons = vec![
            AddOnSelection {
                add_on_id: 100,
                quantity: 2,
            },
            AddOnSelection {
                add_on_id: 101,
                quantity: 3,
            },
        ];
        let breakdown = engine.calculate(date("2026-09-07"), &selection).unwrap();
        assert_eq!(breakdown.add_ons_total, 8.0);
        assert_eq!(breakdown.final_total, 28.0);
    }

    #[test]
    fn unknown_coupon_is_a_silent_no_op() {
        let catalog = catalog(vec![], vec![]);
        let engine = PricingEngine::new(&catalog);
        let mut selection = tickets(&[(ADULT, 2)]);
        selection.coupon_code = Some("NOSUCHCODE".to_string());
        let breakdown = engine.calculate(date("2026-09-07"), &selection).unwrap();
        assert!(breakdown.applied_discounts.is_empty());
        assert_eq!(breakdown.final_total, 40.0);
    }

    #[test]
    fn bogo_coupon_scenario() {
        // SAVE1FREE2: buy 2 get 1 free on Adult; 4 Adults at base 20
        let coupon = ActiveCoupon {
            id: 1,
            code: "SAVE1FREE2".to_string(),
            conditions: None,
            effect: CouponEffect::BuyXGetYFree {
                ticket_tier_id: ADULT,
                buy_quantity: 2,
                get_quantity: 1,
            },
        };
        let catalog = catalog(vec![], vec![coupon]);
        let engine = PricingEngine::new(&catalog);
        let mut selection = tickets(&[(ADULT, 4)]);
        selection.coupon_code = Some("SAVE1FREE2".to_string());

        let breakdown = engine.calculate(date("2026-09-07"), &selection).unwrap();
        assert_eq!(breakdown.applied_discounts.len(), 1);
        assert_eq!(breakdown.applied_discounts[0].name, "Coupon: SAVE1FREE2");
        assert_eq!(breakdown.applied_discounts[0].amount, 40.0);
        assert_eq!(breakdown.final_total, 40.0);
    }

    #[test]
    fn percentage_coupon_mirrors_total_amount_discount() {
        let coupon = ActiveCoupon {
            id: 2,
            code: "TEN".to_string(),
            conditions: None,
            effect: CouponEffect::Percentage { amount: 10.0 },
        };
        let catalog = catalog(vec![], vec![coupon]);
        let engine = PricingEngine::new(&catalog);
        let mut selection = tickets(&[(ADULT, 5)]);
        selection.coupon_code = Some("TEN".to_string());

        let breakdown = engine.calculate(date("2026-09-07"), &selection).unwrap();
        assert_eq!(breakdown.applied_discounts[0].amount, 10.0);
        assert_eq!(breakdown.final_total, 90.0);
    }

    #[test]
    fn coupon_below_minimum_amount_does_not_apply() {
        let coupon = ActiveCoupon {
            id: 3,
            code: "BIGSPEND".to_string(),
            conditions: Some(CouponConditions {
                min_amount: Some(100.0),
                ..Default::default()
            }),
            effect: CouponEffect::Fixed { amount: 20.0 },
        };
        let catalog = catalog(vec![], vec![coupon]);
        let engine = PricingEngine::new(&catalog);
        let mut selection = tickets(&[(ADULT, 2)]);
        selection.coupon_code = Some("BIGSPEND".to_string());

        let breakdown = engine.calculate(date("2026-09-07"), &selection).unwrap();
        assert!(breakdown.applied_discounts.is_empty());
    }

    #[test]
    fn weekend_scenario_with_adjustment_and_discount() {
        // Adult base 20, weekend fixed price 15 (priority 0), non-stackable
        // 10% discount rule (priority 0) over a range covering the date.
        let discount = ActiveRule {
            id: 40,
            name: "September special".to_string(),
            category: RuleCategory::Discount,
            priority: 0,
            is_stackable: false,
            conditions: Some(RuleConditions::Date {
                from_date: Some(date("2026-09-01")),
                to_date: Some(date("2026-09-30")),
                days_of_week: None,
                specific_dates: None,
            }),
            modification: PriceModification::TotalAmountDiscount {
                calculation_mode: CalculationMode::Percentage,
                amount: 10.0,
            },
        };
        let catalog = catalog(vec![weekend_fixed_price(10, 0, ADULT, 15.0), discount], vec![]);
        let engine = PricingEngine::new(&catalog);

        // Saturday
        let breakdown = engine
            .calculate(date("2026-09-05"), &tickets(&[(ADULT, 3)]))
            .unwrap();

        assert_eq!(breakdown.adjusted_subtotal, 45.0);
        assert_eq!(breakdown.applied_discounts[0].amount, 4.5);
        assert_eq!(breakdown.add_ons_total, 0.0);
        assert_eq!(breakdown.final_total, 40.5);
    }

    #[test]
    fn repeated_calculation_is_deterministic() {
        let coupon = ActiveCoupon {
            id: 1,
            code: "SAVE1FREE2".to_string(),
            conditions: None,
            effect: CouponEffect::BuyXGetYFree {
                ticket_tier_id: ADULT,
                buy_quantity: 2,
                get_quantity: 1,
            },
        };
        let catalog = catalog(
            vec![
                weekend_fixed_price(10, 0, ADULT, 15.0),
                percent_discount(30, 1, 10.0, true),
                fixed_discount(31, 2, 2.0, true),
            ],
            vec![coupon],
        );
        let engine = PricingEngine::new(&catalog);
        let mut selection = tickets(&[(ADULT, 5), (CHILD, 2)]);
        selection.coupon_code = Some("SAVE1FREE2".to_string());

        let first = engine.calculate(date("2026-09-05"), &selection).unwrap();
        for _ in 0..10 {
            let again = engine.calculate(date("2026-09-05"), &selection).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn priced_tiers_preview_applies_date_adjustments() {
        let catalog = catalog(vec![weekend_fixed_price(10, 0, ADULT, 15.0)], vec![]);
        let engine = PricingEngine::new(&catalog);

        // Saturday: adult adjusted, child untouched
        let saturday = engine.priced_tiers_for_date(date("2026-09-05"));
        assert_eq!(saturday[0].price, 15.0);
        assert_eq!(saturday[0].base_price, 20.0);
        assert_eq!(saturday[1].price, 10.0);

        // Monday: no adjustment
        let monday = engine.priced_tiers_for_date(date("2026-09-07"));
        assert_eq!(monday[0].price, 20.0);
    }
}
