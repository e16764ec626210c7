//! Provider entity model
//!
//! This module contains the SeaORM entity model for the providers table: one
//! row per configured AI vendor integration, keyed by its immutable slug.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

use super::capability::{Capability, CapabilityMap, CapabilityMapError};

/// Provider entity representing one AI vendor integration
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    /// Unique slug identifier for the provider (primary key, immutable)
    #[sea_orm(primary_key, auto_increment = false)]
    pub slug: String,

    /// Human readable name shown to operators
    pub display_name: String,

    /// Inactive providers resolve to `disabled` for everyone
    pub is_active: bool,

    /// Typed capability map stored as JSON
    #[sea_orm(column_type = "JsonBinary")]
    pub capabilities: Json,

    /// Sealed organisation-owned credential
    pub shared_credential_ciphertext: Option<Vec<u8>>,

    /// Whether non-super operators may use the shared credential
    pub allow_shared_for_operators: bool,

    /// Base URL of the vendor API, used for model discovery
    pub api_base_url: Option<String>,

    /// Operator that created the provider
    pub created_by: Option<Uuid>,

    /// Timestamp when the provider was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the provider was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::capability_model::Entity")]
    CapabilityModel,
    #[sea_orm(has_many = "super::admin_override_setting::Entity")]
    AdminOverrideSetting,
}

impl Related<super::capability_model::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CapabilityModel.def()
    }
}

impl Related<super::admin_override_setting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AdminOverrideSetting.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parses the stored capability map.
    pub fn capability_map(&self) -> Result<CapabilityMap, CapabilityMapError> {
        CapabilityMap::from_json(&self.capabilities)
    }

    /// Whether the provider declares support for `capability`. A map that no
    /// longer parses counts as supporting nothing.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capability_map()
            .map(|map| map.supports(capability))
            .unwrap_or(false)
    }

    pub fn has_shared_credential(&self) -> bool {
        self.shared_credential_ciphertext
            .as_ref()
            .is_some_and(|ciphertext| !ciphertext.is_empty())
    }
}
