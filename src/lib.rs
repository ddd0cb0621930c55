pub mod backend;
pub mod booking;
pub mod db;
pub mod domain;
pub mod inventory;
pub mod payment;
pub mod pricing;
pub mod utils;
