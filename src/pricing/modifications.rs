use crate::domain::breakdown::LineItem;
use crate::domain::rules::{CalculationMode, CouponEffect, PriceModification};

/// Unit-price override for one tier from a `set_fixed_price` adjustment.
/// Tiers not listed in the override list keep their base price.
pub fn unit_price_override(modification: &PriceModification, tier_id: i64) -> Option<f64> {
    match modification {
        PriceModification::SetFixedPrice { tiers } => tiers
            .iter()
            .find(|t| t.ticket_tier_id == tier_id)
            .map(|t| t.value),
        _ => None,
    }
}

/// Discount amount produced by a discount-category rule against the
/// current breakdown state. Adjustment-type payloads yield zero here.
pub fn discount_amount(
    modification: &PriceModification,
    adjusted_subtotal: f64,
    line_items: &[LineItem],
) -> f64 {
    match modification {
        PriceModification::TotalAmountDiscount {
            calculation_mode,
            amount,
        } => total_amount_discount(*calculation_mode, *amount, adjusted_subtotal),
        PriceModification::BuyXGetYFree {
            ticket_tier_id,
            buy_quantity,
            get_quantity,
        } => bogo_discount(line_items, *ticket_tier_id, *buy_quantity, *get_quantity),
        PriceModification::SetFixedPrice { .. } => 0.0,
    }
}

pub fn coupon_discount_amount(
    effect: &CouponEffect,
    adjusted_subtotal: f64,
    line_items: &[LineItem],
) -> f64 {
    match effect {
        CouponEffect::Percentage { amount } => {
            total_amount_discount(CalculationMode::Percentage, *amount, adjusted_subtotal)
        }
        CouponEffect::Fixed { amount } => {
            total_amount_discount(CalculationMode::Fixed, *amount, adjusted_subtotal)
        }
        CouponEffect::BuyXGetYFree {
            ticket_tier_id,
            buy_quantity,
            get_quantity,
        } => bogo_discount(line_items, *ticket_tier_id, *buy_quantity, *get_quantity),
    }
}

pub fn total_amount_discount(mode: CalculationMode, amount: f64, subtotal: f64) -> f64 {
    match mode {
        CalculationMode::Percentage => subtotal * (amount / 100.0),
        CalculationMode::Fixed => amount,
    }
}

/// `free_units = min(selected, floor(selected / buy) * get)`, priced at the
/// tier's unit price in the breakdown (rule-adjusted, not base).
pub fn bogo_discount(
    line_items: &[LineItem],
    ticket_tier_id: i64,
    buy_quantity: i64,
    get_quantity: i64,
) -> f64 {
    if buy_quantity < 1 {
        return 0.0;
    }

    let Some(item) = line_items.iter().find(|i| i.ticket_tier_id == ticket_tier_id) else {
        return 0.0;
    };

    let earned = (item.quantity / buy_quantity) * get_quantity;
    let free_units = earned.min(item.quantity);

    free_units as f64 * item.unit_price
}
