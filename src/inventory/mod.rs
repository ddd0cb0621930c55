pub mod slots;

pub use slots::{InventoryLedger, plan_slots};
