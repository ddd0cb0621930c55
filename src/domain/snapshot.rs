use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::breakdown::{AppliedDiscount, LineItem};
use crate::domain::selection::{AddOnSelection, Selection, TicketSelection};

/// The `intent_data` snapshot persisted on a booking intent, and verbatim
/// the `booking_data_snapshot` copied onto the final booking. It must
/// round-trip exactly: this is the audit record that outlives later edits
/// to tiers, rules and add-ons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentData {
    pub date: NaiveDate,
    pub slot_id: i64,
    /// Priced line items copied from the breakdown, not the raw request.
    pub tickets: Vec<LineItem>,
    pub add_ons: Vec<AddOnSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub applied_discounts: Vec<AppliedDiscount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_info: Option<VisitorInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOnSnapshot {
    pub add_on_id: i64,
    pub name: String,
    pub quantity: i64,
    /// 0 when the add-on is included in the ticket.
    pub price_at_booking: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub is_guest: bool,
}

impl IntentData {
    /// Rebuild the engine input from the stored snapshot. Finalization
    /// re-prices from this, never from anything client-supplied.
    pub fn selection(&self) -> Selection {
        Selection {
            tickets: self
                .tickets
                .iter()
                .map(|item| TicketSelection {
                    tier_id: item.ticket_tier_id,
                    quantity: item.quantity,
                })
                .collect(),
            add_ons: self
                .add_ons
                .iter()
                .map(|a| AddOnSelection {
                    add_on_id: a.add_on_id,
                    quantity: a.quantity,
                })
                .collect(),
            coupon_code: self.coupon_code.clone(),
        }
    }

    pub fn total_ticket_quantity(&self) -> i64 {
        self.tickets.iter().map(|t| t.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IntentData {
        IntentData {
            date: "2026-09-05".parse().unwrap(),
            slot_id: 42,
            tickets: vec![LineItem {
                ticket_tier_id: 1,
                name: "Adult".to_string(),
                quantity: 3,
                unit_price: 15.0,
                subtotal: 45.0,
            }],
            add_ons: vec![AddOnSnapshot {
                add_on_id: 9,
                name: "Locker".to_string(),
                quantity: 1,
                price_at_booking: 4.0,
            }],
            coupon_code: Some("SAVE1FREE2".to_string()),
            applied_discounts: vec![AppliedDiscount {
                name: "Weekend deal".to_string(),
                amount: 4.5,
            }],
            visitor_info: None,
        }
    }

    #[test]
    fn snapshot_round_trips_exactly() {
        let data = sample();
        let json = serde_json::to_value(&data).unwrap();
        let back: IntentData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn selection_is_rebuilt_from_snapshot() {
        let selection = sample().selection();
        assert_eq!(selection.tickets.len(), 1);
        assert_eq!(selection.tickets[0].tier_id, 1);
        assert_eq!(selection.tickets[0].quantity, 3);
        assert_eq!(selection.add_ons[0].add_on_id, 9);
        assert_eq!(selection.coupon_code.as_deref(), Some("SAVE1FREE2"));
    }
}
