//! # Data Models
//!
//! This module contains the persisted entities and typed configuration values
//! used throughout the access engine.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod admin_override_setting;
pub mod capability;
pub mod capability_model;
pub mod maintenance_run;
pub mod provider;

pub use admin_override_setting::Entity as AdminOverrideSetting;
pub use capability::{Capability, CapabilityMap, CapabilityMapError, CapabilitySupport};
pub use capability_model::Entity as CapabilityModel;
pub use maintenance_run::Entity as MaintenanceRun;
pub use provider::Entity as Provider;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "ai-access".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
