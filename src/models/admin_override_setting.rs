//! Admin override setting entity
//!
//! Per-operator, per-provider override carrying the operator's optional sealed
//! personal credential. Unique on (operator_id, provider_slug).

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

use super::provider::Entity as Provider;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_override_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub operator_id: Uuid,

    pub provider_slug: String,

    pub is_active: bool,

    /// Sealed personal credential; only meaningful while the setting is active
    pub personal_credential_ciphertext: Option<Vec<u8>>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Provider",
        from = "Column::ProviderSlug",
        to = "super::provider::Column::Slug"
    )]
    Provider,
}

impl Related<Provider> for Entity {
    fn to() -> RelationDef {
        Relation::Provider.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// An active setting holding a non-empty personal credential.
    pub fn grants_personal_access(&self) -> bool {
        self.is_active
            && self
                .personal_credential_ciphertext
                .as_ref()
                .is_some_and(|ciphertext| !ciphertext.is_empty())
    }
}
