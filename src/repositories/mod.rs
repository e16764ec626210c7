//! # Repository Layer
//!
//! Repository implementations encapsulating SeaORM operations for the
//! configuration store tables.

pub mod capability_model;
pub mod override_setting;
pub mod provider;

pub use capability_model::{CapabilityModelRepository, ModelUpsert, UpsertOutcome};
pub use override_setting::OverrideSettingRepository;
pub use provider::{NewProvider, ProviderChanges, ProviderRepository};
