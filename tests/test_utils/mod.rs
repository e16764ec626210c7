//! Test utilities for database testing.
//!
//! In-memory SQLite databases with every migration applied, plus fixtures
//! for providers, models and a fully composed engine.

#![allow(dead_code)]

use ai_access::config::AppConfig;
use ai_access::crypto::{Credential, CredentialScope, CryptoKey, seal_credential};
use ai_access::destinations::DestinationRegistry;
use ai_access::models::capability::{Capability, CapabilityMap, CapabilitySupport};
use ai_access::models::{capability_model, provider};
use ai_access::repositories::{NewProvider, ProviderRepository};
use ai_access::server::AppState;
use ai_access::sync::{DiscoveredModel, DiscoveryError, ModelDiscovery};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const TEST_KEY_BYTES: [u8; 32] = [7u8; 32];
pub const SHARED_SECRET: &str = "sk-shared-org";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_key() -> CryptoKey {
    CryptoKey::new(TEST_KEY_BYTES.to_vec()).expect("test key is 32 bytes")
}

pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".into(),
        database_url: "sqlite::memory:".into(),
        crypto_key: Some(TEST_KEY_BYTES.to_vec()),
        ..AppConfig::default()
    }
}

pub fn seal_shared(slug: &str, secret: &str) -> Vec<u8> {
    seal_credential(
        &test_key(),
        CredentialScope::Shared {
            provider_slug: slug,
        },
        &Credential::new(secret),
    )
    .expect("sealing succeeds")
}

/// An active provider that shares its credential with every operator.
pub fn shared_provider(slug: &str, capabilities: CapabilityMap) -> NewProvider {
    NewProvider {
        slug: slug.to_string(),
        display_name: slug.to_uppercase(),
        is_active: true,
        capabilities,
        shared_credential_ciphertext: Some(seal_shared(slug, SHARED_SECRET)),
        allow_shared_for_operators: true,
        api_base_url: None,
        created_by: None,
    }
}

pub fn chat_map() -> CapabilityMap {
    CapabilityMap::new()
        .with(Capability::Chat, CapabilitySupport::dynamic())
        .with(Capability::Content, CapabilitySupport::dynamic())
}

pub async fn insert_provider(db: &DatabaseConnection, new: NewProvider) -> Result<provider::Model> {
    Ok(ProviderRepository::new(Arc::new(db.clone()))
        .create(new)
        .await?)
}

/// Inserts a capability model row directly.
pub async fn insert_model(
    db: &DatabaseConnection,
    provider_slug: &str,
    capability: Capability,
    model_identifier: &str,
    is_active: bool,
) -> Result<capability_model::Model> {
    let now = Utc::now();
    Ok(capability_model::ActiveModel {
        provider_slug: Set(provider_slug.to_string()),
        capability: Set(capability),
        model_identifier: Set(model_identifier.to_string()),
        display_name: Set(None),
        is_active: Set(is_active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

/// Discovery answering from a fixed table; providers without an entry fail.
#[derive(Default)]
pub struct StaticDiscovery {
    listings: Mutex<HashMap<String, Vec<DiscoveredModel>>>,
}

impl StaticDiscovery {
    pub fn with(self, slug: &str, models: Vec<DiscoveredModel>) -> Self {
        self.set(slug, models);
        self
    }

    pub fn set(&self, slug: &str, models: Vec<DiscoveredModel>) {
        self.listings
            .lock()
            .unwrap()
            .insert(slug.to_string(), models);
    }
}

#[async_trait]
impl ModelDiscovery for StaticDiscovery {
    async fn discover(
        &self,
        provider: &provider::Model,
    ) -> Result<Vec<DiscoveredModel>, DiscoveryError> {
        self.listings
            .lock()
            .unwrap()
            .get(&provider.slug)
            .cloned()
            .ok_or(DiscoveryError::Status { status: 503 })
    }
}

pub fn discovered(identifier: &str, capabilities: &[Capability]) -> DiscoveredModel {
    DiscoveredModel {
        identifier: identifier.to_string(),
        display_name: None,
        capabilities: capabilities.to_vec(),
    }
}

/// Engine composed over a fresh database, as the server would build it.
pub async fn compose_engine(discovery: Arc<dyn ModelDiscovery>) -> Result<(AppState, DatabaseConnection)> {
    let db = setup_test_db().await?;
    let state = AppState::compose(
        Arc::new(test_config()),
        Arc::new(db.clone()),
        discovery,
        DestinationRegistry::new(),
    )?;
    Ok((state, db))
}
