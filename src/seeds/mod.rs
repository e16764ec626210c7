//! Database seeding functionality
//!
//! Populates the configuration store with the default provider catalogue.

pub mod provider;

pub use provider::seed_providers;
