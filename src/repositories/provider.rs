//! Provider repository for database operations
//!
//! Encapsulates SeaORM operations for the providers table. Slugs are validated
//! on create and never rewritten afterwards.

use chrono::Utc;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult, is_unique_violation};
use crate::models::capability::CapabilityMap;
use crate::models::provider::{self, Entity as Provider};
use crate::models::{admin_override_setting, capability_model};

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{1,62}$").expect("slug regex must compile"))
}

/// Rejects slugs that are not lowercase url-safe identifiers.
pub fn validate_slug(slug: &str) -> EngineResult<()> {
    if slug_re().is_match(slug) {
        Ok(())
    } else {
        Err(EngineError::InvalidSlug {
            slug: slug.to_string(),
        })
    }
}

/// Accepts only absolute http(s) URLs for a vendor API base.
pub fn validate_api_base_url(value: &str) -> EngineResult<()> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(EngineError::InvalidApiBaseUrl {
            url: value.to_string(),
        }),
    }
}

/// Fields of a provider being created.
#[derive(Debug, Clone)]
pub struct NewProvider {
    pub slug: String,
    pub display_name: String,
    pub is_active: bool,
    pub capabilities: CapabilityMap,
    pub shared_credential_ciphertext: Option<Vec<u8>>,
    pub allow_shared_for_operators: bool,
    pub api_base_url: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Partial update of a provider. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProviderChanges {
    pub display_name: Option<String>,
    pub is_active: Option<bool>,
    pub capabilities: Option<CapabilityMap>,
    /// `Some(None)` clears the shared credential.
    pub shared_credential_ciphertext: Option<Option<Vec<u8>>>,
    pub allow_shared_for_operators: Option<bool>,
    pub api_base_url: Option<Option<String>>,
}

/// Repository for provider database operations
#[derive(Debug, Clone)]
pub struct ProviderRepository {
    pub db: Arc<DatabaseConnection>,
}

impl ProviderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_slug(&self, slug: &str) -> EngineResult<Option<provider::Model>> {
        Ok(Provider::find_by_id(slug.to_string()).one(&*self.db).await?)
    }

    /// Every provider, active or not, ordered by slug.
    pub async fn find_all(&self) -> EngineResult<Vec<provider::Model>> {
        Ok(Provider::find()
            .order_by_asc(provider::Column::Slug)
            .all(&*self.db)
            .await?)
    }

    pub async fn find_active(&self) -> EngineResult<Vec<provider::Model>> {
        Ok(Provider::find()
            .filter(provider::Column::IsActive.eq(true))
            .order_by_asc(provider::Column::Slug)
            .all(&*self.db)
            .await?)
    }

    pub async fn create(&self, new: NewProvider) -> EngineResult<provider::Model> {
        validate_slug(&new.slug)?;
        new.capabilities.validate()?;
        if let Some(api_base_url) = new.api_base_url.as_deref() {
            validate_api_base_url(api_base_url)?;
        }

        let now = Utc::now();
        let model = provider::ActiveModel {
            slug: Set(new.slug.clone()),
            display_name: Set(new.display_name),
            is_active: Set(new.is_active),
            capabilities: Set(new.capabilities.to_json()),
            shared_credential_ciphertext: Set(new.shared_credential_ciphertext),
            allow_shared_for_operators: Set(new.allow_shared_for_operators),
            api_base_url: Set(new.api_base_url),
            created_by: Set(new.created_by),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        model.insert(&*self.db).await.map_err(|err| {
            if is_unique_violation(&err) {
                EngineError::ProviderExists { slug: new.slug }
            } else {
                err.into()
            }
        })
    }

    pub async fn update_by_slug(
        &self,
        slug: &str,
        changes: ProviderChanges,
    ) -> EngineResult<provider::Model> {
        let existing = self
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| EngineError::ProviderNotFound {
                slug: slug.to_string(),
            })?;

        let mut active_model: provider::ActiveModel = existing.into();
        if let Some(display_name) = changes.display_name {
            active_model.display_name = Set(display_name);
        }
        if let Some(is_active) = changes.is_active {
            active_model.is_active = Set(is_active);
        }
        if let Some(capabilities) = changes.capabilities {
            capabilities.validate()?;
            active_model.capabilities = Set(capabilities.to_json());
        }
        if let Some(ciphertext) = changes.shared_credential_ciphertext {
            active_model.shared_credential_ciphertext = Set(ciphertext);
        }
        if let Some(allow) = changes.allow_shared_for_operators {
            active_model.allow_shared_for_operators = Set(allow);
        }
        if let Some(api_base_url) = changes.api_base_url {
            if let Some(value) = api_base_url.as_deref() {
                validate_api_base_url(value)?;
            }
            active_model.api_base_url = Set(api_base_url);
        }
        active_model.updated_at = Set(Utc::now().into());

        Ok(active_model.update(&*self.db).await?)
    }

    /// Hard delete, refused while any model or override setting references
    /// the provider. Deactivation is the normal way to retire a provider.
    pub async fn delete_by_slug(&self, slug: &str) -> EngineResult<()> {
        let models = capability_model::Entity::find()
            .filter(capability_model::Column::ProviderSlug.eq(slug))
            .count(&*self.db)
            .await?;
        let overrides = admin_override_setting::Entity::find()
            .filter(admin_override_setting::Column::ProviderSlug.eq(slug))
            .count(&*self.db)
            .await?;
        if models > 0 || overrides > 0 {
            return Err(EngineError::ProviderInUse {
                slug: slug.to_string(),
            });
        }

        let delete_result = Provider::delete_by_id(slug.to_string())
            .exec(&*self.db)
            .await?;
        if delete_result.rows_affected == 0 {
            return Err(EngineError::ProviderNotFound {
                slug: slug.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_validation() {
        for ok in ["openai", "eleven-labs", "x_ai", "g2"] {
            assert!(validate_slug(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["", "a", "OpenAI", "-lead", "has space", "dot.ted"] {
            assert!(
                matches!(validate_slug(bad), Err(EngineError::InvalidSlug { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn api_base_url_validation() {
        assert!(validate_api_base_url("https://api.openai.com/v1").is_ok());
        assert!(validate_api_base_url("http://localhost:8080").is_ok());
        for bad in ["api.openai.com", "ftp://vendor.example", "not a url"] {
            assert!(
                matches!(
                    validate_api_base_url(bad),
                    Err(EngineError::InvalidApiBaseUrl { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
