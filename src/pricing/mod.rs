pub mod conditions;
pub mod engine;
pub mod modifications;
