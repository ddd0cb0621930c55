use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::error::BookingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rule_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    BasePriceAdjustment,
    Discount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coupon_discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CouponDiscountType {
    Percentage,
    Fixed,
    BuyXGetYFree,
}

/// Applicability predicate stored in the `conditions` JSON column. A rule
/// whose column is NULL always matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConditions {
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from_date: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to_date: Option<NaiveDate>,
        /// 0 = Sunday .. 6 = Saturday
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days_of_week: Option<Vec<u32>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        specific_dates: Option<Vec<NaiveDate>>,
    },
    TicketQuantity {
        ticket_tier_id: i64,
        min_quantity: i64,
    },
}

impl RuleConditions {
    /// Write-time validation. A date condition must specify exactly one of
    /// {date range, specific dates, days of week}; the evaluator stays
    /// permissive for rows that predate this check.
    pub fn validate(&self) -> Result<(), BookingError> {
        match self {
            RuleConditions::Date {
                from_date,
                to_date,
                days_of_week,
                specific_dates,
            } => {
                if from_date.is_some() != to_date.is_some() {
                    return Err(BookingError::Validation(
                        "date condition range requires both from_date and to_date".to_string(),
                    ));
                }
                let has_range = from_date.is_some() && to_date.is_some();
                let has_days = days_of_week.as_ref().is_some_and(|d| !d.is_empty());
                let has_dates = specific_dates.as_ref().is_some_and(|d| !d.is_empty());
                let given = [has_range, has_days, has_dates]
                    .iter()
                    .filter(|v| **v)
                    .count();
                if given != 1 {
                    return Err(BookingError::Validation(
                        "date condition must specify exactly one of range, specific_dates or days_of_week"
                            .to_string(),
                    ));
                }
                if let Some(days) = days_of_week {
                    if days.iter().any(|d| *d > 6) {
                        return Err(BookingError::Validation(
                            "days_of_week entries must be 0 (Sunday) through 6 (Saturday)"
                                .to_string(),
                        ));
                    }
                }
                if has_range && from_date > to_date {
                    return Err(BookingError::Validation(
                        "from_date must not be after to_date".to_string(),
                    ));
                }
                Ok(())
            }
            RuleConditions::TicketQuantity { min_quantity, .. } => {
                if *min_quantity < 1 {
                    return Err(BookingError::Validation(
                        "ticket_quantity condition requires min_quantity >= 1".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPriceOverride {
    pub ticket_tier_id: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMode {
    Percentage,
    Fixed,
}

/// Effect payload stored in the `price_modification` JSON column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PriceModification {
    /// Per-tier unit price override; tiers not listed keep their base price.
    SetFixedPrice { tiers: Vec<TierPriceOverride> },
    TotalAmountDiscount {
        calculation_mode: CalculationMode,
        amount: f64,
    },
    BuyXGetYFree {
        ticket_tier_id: i64,
        buy_quantity: i64,
        get_quantity: i64,
    },
}

impl PriceModification {
    pub fn validate(&self, category: RuleCategory) -> Result<(), BookingError> {
        match (category, self) {
            (RuleCategory::BasePriceAdjustment, PriceModification::SetFixedPrice { tiers }) => {
                if tiers.is_empty() {
                    return Err(BookingError::Validation(
                        "set_fixed_price requires at least one tier override".to_string(),
                    ));
                }
                Ok(())
            }
            (RuleCategory::Discount, PriceModification::TotalAmountDiscount { amount, .. }) => {
                if *amount < 0.0 {
                    return Err(BookingError::Validation(
                        "total_amount_discount amount must not be negative".to_string(),
                    ));
                }
                Ok(())
            }
            (
                RuleCategory::Discount,
                PriceModification::BuyXGetYFree {
                    buy_quantity,
                    get_quantity,
                    ..
                },
            ) => {
                if *buy_quantity < 1 || *get_quantity < 1 {
                    return Err(BookingError::Validation(
                        "buy_x_get_y_free quantities must be >= 1".to_string(),
                    ));
                }
                Ok(())
            }
            (category, modification) => Err(BookingError::Validation(format!(
                "modification {:?} is not valid for rule category {:?}",
                modification, category
            ))),
        }
    }
}

/// A pricing rule as the engine consumes it: decoded JSON columns, active
/// rows only, ordered `(priority, id)` ascending.
#[derive(Debug, Clone)]
pub struct ActiveRule {
    pub id: i64,
    pub name: String,
    pub category: RuleCategory,
    pub priority: i32,
    pub is_stackable: bool,
    pub conditions: Option<RuleConditions>,
    pub modification: PriceModification,
}

/// Coupon `conditions` JSON. All present checks must pass for the coupon
/// to apply; an absent column always applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouponConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_dates: Option<Vec<NaiveDate>>,
}

/// Coupon `effects` JSON, discriminated by the `discount_type` column.
#[derive(Debug, Clone, PartialEq)]
pub enum CouponEffect {
    Percentage { amount: f64 },
    Fixed { amount: f64 },
    BuyXGetYFree {
        ticket_tier_id: i64,
        buy_quantity: i64,
        get_quantity: i64,
    },
}

impl CouponEffect {
    pub fn decode(
        discount_type: CouponDiscountType,
        effects: &serde_json::Value,
    ) -> Result<Self, BookingError> {
        #[derive(Deserialize)]
        struct AmountEffect {
            amount: f64,
        }
        #[derive(Deserialize)]
        struct BogoEffect {
            ticket_tier_id: i64,
            buy_quantity: i64,
            get_quantity: i64,
        }

        match discount_type {
            CouponDiscountType::Percentage => {
                let e: AmountEffect = serde_json::from_value(effects.clone())?;
                Ok(CouponEffect::Percentage { amount: e.amount })
            }
            CouponDiscountType::Fixed => {
                let e: AmountEffect = serde_json::from_value(effects.clone())?;
                Ok(CouponEffect::Fixed { amount: e.amount })
            }
            CouponDiscountType::BuyXGetYFree => {
                let e: BogoEffect = serde_json::from_value(effects.clone())?;
                Ok(CouponEffect::BuyXGetYFree {
                    ticket_tier_id: e.ticket_tier_id,
                    buy_quantity: e.buy_quantity,
                    get_quantity: e.get_quantity,
                })
            }
        }
    }
}

/// A coupon as the engine consumes it.
#[derive(Debug, Clone)]
pub struct ActiveCoupon {
    pub id: i64,
    pub code: String,
    pub conditions: Option<CouponConditions>,
    pub effect: CouponEffect,
}
