//! Lattice Shopper
//!
//! Lattice Shopper drives purchasing tasks against a remote basket service, finding the cheapest
//! basket composition and coupon combination that satisfies a task before committing it.

pub mod actions;
pub mod basket;
pub mod catalog;
pub mod checkout;
pub mod compositions;
pub mod config;
pub mod coupons;
pub mod fixtures;
pub mod money;
pub mod observability;
pub mod optimiser;
pub mod prelude;
pub mod products;
pub mod receipt;
pub mod retry;
pub mod session;
pub mod store;
pub mod task;
pub mod usage;
