use chrono::{Datelike, NaiveDate};

use crate::domain::rules::{CouponConditions, RuleConditions};

/// A (tier, quantity) pair as seen by condition checks. Phase 1 evaluates
/// against the raw selection, later phases against the built line items.
#[derive(Debug, Clone, Copy)]
pub struct TierQuantity {
    pub ticket_tier_id: i64,
    pub quantity: i64,
}

/// A rule with no conditions always matches. A date condition requires all
/// of its present sub-checks to pass; a ticket-quantity condition requires
/// the named tier to be selected with at least the minimum quantity.
pub fn is_satisfied(
    conditions: Option<&RuleConditions>,
    date: NaiveDate,
    quantities: &[TierQuantity],
) -> bool {
    let Some(conditions) = conditions else {
        return true;
    };

    match conditions {
        RuleConditions::Date {
            from_date,
            to_date,
            days_of_week,
            specific_dates,
        } => date_checks_pass(
            date,
            *from_date,
            *to_date,
            days_of_week.as_deref(),
            specific_dates.as_deref(),
        ),
        RuleConditions::TicketQuantity {
            ticket_tier_id,
            min_quantity,
        } => quantities
            .iter()
            .find(|q| q.ticket_tier_id == *ticket_tier_id)
            .is_some_and(|q| q.quantity >= *min_quantity),
    }
}

/// Preview variant used before any selection exists: quantity conditions
/// cannot be evaluated yet and are treated as applicable.
pub fn matches_for_date_preview(conditions: Option<&RuleConditions>, date: NaiveDate) -> bool {
    match conditions {
        None | Some(RuleConditions::TicketQuantity { .. }) => true,
        Some(RuleConditions::Date {
            from_date,
            to_date,
            days_of_week,
            specific_dates,
        }) => date_checks_pass(
            date,
            *from_date,
            *to_date,
            days_of_week.as_deref(),
            specific_dates.as_deref(),
        ),
    }
}

pub fn coupon_conditions_met(
    conditions: Option<&CouponConditions>,
    date: NaiveDate,
    adjusted_subtotal: f64,
) -> bool {
    let Some(conditions) = conditions else {
        return true;
    };

    if let Some(min_amount) = conditions.min_amount {
        if adjusted_subtotal < min_amount {
            return false;
        }
    }

    date_checks_pass(
        date,
        conditions.from_date,
        conditions.to_date,
        conditions.days_of_week.as_deref(),
        conditions.specific_dates.as_deref(),
    )
}

fn date_checks_pass(
    date: NaiveDate,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
    days_of_week: Option<&[u32]>,
    specific_dates: Option<&[NaiveDate]>,
) -> bool {
    if let (Some(from), Some(to)) = (from_date, to_date) {
        if date < from || date > to {
            return false;
        }
    }

    if let Some(days) = days_of_week {
        if !days.is_empty() && !days.contains(&date.weekday().num_days_from_sunday()) {
            return false;
        }
    }

    if let Some(dates) = specific_dates {
        if !dates.is_empty() && !dates.contains(&date) {
            return false;
        }
    }

    true
}
