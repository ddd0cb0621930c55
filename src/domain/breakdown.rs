use serde::{Deserialize, Serialize};

/// Transient result of one pricing run. Never persisted as-is; the intent
/// snapshot copies its line items and applied discounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Sum over line items using true base prices.
    pub base_subtotal: f64,
    /// Sum over line items using rule-adjusted unit prices.
    pub adjusted_subtotal: f64,
    pub line_items: Vec<LineItem>,
    pub applied_discounts: Vec<AppliedDiscount>,
    pub add_ons_total: f64,
    pub final_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub ticket_tier_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub name: String,
    pub amount: f64,
}

impl PriceBreakdown {
    pub fn discounts_total(&self) -> f64 {
        self.applied_discounts.iter().map(|d| d.amount).sum()
    }

    /// Phase 6: grand total, clamped so discounts can never drive it negative.
    pub fn calculate_final_total(&mut self) {
        self.final_total =
            (self.adjusted_subtotal - self.discounts_total() + self.add_ons_total).max(0.0);
    }
}

/// Round a currency amount to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_total_clamps_at_zero() {
        let mut breakdown = PriceBreakdown {
            adjusted_subtotal: 10.0,
            applied_discounts: vec![AppliedDiscount {
                name: "Everything off".to_string(),
                amount: 25.0,
            }],
            add_ons_total: 5.0,
            ..Default::default()
        };
        breakdown.calculate_final_total();
        assert_eq!(breakdown.final_total, 0.0);
    }

    #[test]
    fn round2_behaves_at_the_cent_boundary() {
        assert_eq!(round2(4.499), 4.5);
        assert_eq!(round2(4.504), 4.5);
        assert_eq!(round2(4.505), 4.51);
    }
}
