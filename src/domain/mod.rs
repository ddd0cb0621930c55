pub mod breakdown;
pub mod rules;
pub mod selection;
pub mod snapshot;
