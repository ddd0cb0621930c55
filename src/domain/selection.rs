use serde::{Deserialize, Serialize};

/// What the customer picked: ticket quantities, add-on quantities and an
/// optional coupon code. This is the engine's input; the priced snapshot
/// (`IntentData`) is derived from the breakdown, never from this raw form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub tickets: Vec<TicketSelection>,
    #[serde(default)]
    pub add_ons: Vec<AddOnSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSelection {
    pub tier_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOnSelection {
    pub add_on_id: i64,
    pub quantity: i64,
}

impl Selection {
    pub fn total_ticket_quantity(&self) -> i64 {
        self.tickets.iter().map(|t| t.quantity).sum()
    }
}
